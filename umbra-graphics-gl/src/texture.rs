// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use crate::{server::GlGraphicsServer, ToGlConstant};
use glow::{HasContext, PixelPackData};
use std::{
    any::Any,
    marker::PhantomData,
    rc::{Rc, Weak},
};
use umbra_core::{color::Color, log::Log};
use umbra_graphics::{
    error::FrameworkError,
    gpu_texture::{
        image_size_bytes, validate_texture_data, Coordinate, CubeMapFace, GpuTexture,
        GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter, PixelKind,
        WrapMode,
    },
};

pub(crate) fn gl_texture_target(kind: GpuTextureKind) -> u32 {
    match kind {
        GpuTextureKind::Line { .. } => glow::TEXTURE_1D,
        GpuTextureKind::Rectangle { .. } => glow::TEXTURE_2D,
        GpuTextureKind::Cube { .. } => glow::TEXTURE_CUBE_MAP,
        GpuTextureKind::Volume { .. } => glow::TEXTURE_3D,
    }
}

impl ToGlConstant for MinificationFilter {
    fn into_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::NearestMipMapNearest => glow::NEAREST_MIPMAP_NEAREST,
            Self::NearestMipMapLinear => glow::NEAREST_MIPMAP_LINEAR,
            Self::Linear => glow::LINEAR,
            Self::LinearMipMapNearest => glow::LINEAR_MIPMAP_NEAREST,
            Self::LinearMipMapLinear => glow::LINEAR_MIPMAP_LINEAR,
        }
    }
}

impl ToGlConstant for MagnificationFilter {
    fn into_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
        }
    }
}

impl ToGlConstant for WrapMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Repeat => glow::REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
            Self::ClampToBorder => glow::CLAMP_TO_BORDER,
            Self::MirroredRepeat => glow::MIRRORED_REPEAT,
        }
    }
}

impl ToGlConstant for Coordinate {
    fn into_gl(self) -> u32 {
        match self {
            Self::S => glow::TEXTURE_WRAP_S,
            Self::T => glow::TEXTURE_WRAP_T,
            Self::R => glow::TEXTURE_WRAP_R,
        }
    }
}

impl ToGlConstant for CubeMapFace {
    fn into_gl(self) -> u32 {
        match self {
            Self::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
            Self::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
            Self::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
            Self::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            Self::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
            Self::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        }
    }
}

pub(crate) struct PixelDescriptor {
    pub data_type: u32,
    pub format: u32,
    pub internal_format: u32,
}

pub(crate) fn pixel_descriptor(pixel_kind: PixelKind) -> PixelDescriptor {
    let (data_type, format, internal_format) = match pixel_kind {
        PixelKind::R8 => (glow::UNSIGNED_BYTE, glow::RED, glow::R8),
        PixelKind::R16F => (glow::HALF_FLOAT, glow::RED, glow::R16F),
        PixelKind::R32F => (glow::FLOAT, glow::RED, glow::R32F),
        PixelKind::RG8 => (glow::UNSIGNED_BYTE, glow::RG, glow::RG8),
        PixelKind::RG16F => (glow::HALF_FLOAT, glow::RG, glow::RG16F),
        PixelKind::RGB8 => (glow::UNSIGNED_BYTE, glow::RGB, glow::RGB8),
        PixelKind::RGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::RGBA8),
        PixelKind::SRGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::SRGB8_ALPHA8),
        PixelKind::RGB16F => (glow::HALF_FLOAT, glow::RGB, glow::RGB16F),
        PixelKind::RGBA16F => (glow::HALF_FLOAT, glow::RGBA, glow::RGBA16F),
        PixelKind::RGBA32F => (glow::FLOAT, glow::RGBA, glow::RGBA32F),
        PixelKind::R11G11B10F => (
            glow::UNSIGNED_INT_10F_11F_11F_REV,
            glow::RGB,
            glow::R11F_G11F_B10F,
        ),
        PixelKind::D16 => (
            glow::UNSIGNED_SHORT,
            glow::DEPTH_COMPONENT,
            glow::DEPTH_COMPONENT16,
        ),
        PixelKind::D24S8 => (
            glow::UNSIGNED_INT_24_8,
            glow::DEPTH_STENCIL,
            glow::DEPTH24_STENCIL8,
        ),
        PixelKind::D32F => (
            glow::FLOAT,
            glow::DEPTH_COMPONENT,
            glow::DEPTH_COMPONENT32F,
        ),
    };

    PixelDescriptor {
        data_type,
        format,
        internal_format,
    }
}

/// Binds the texture to a free unit for the lifetime of the binding, used to change texture
/// parameters outside of draw calls.
struct TempBinding {
    server: Rc<GlGraphicsServer>,
    unit: u32,
    target: u32,
}

impl TempBinding {
    fn new(texture: &GlTexture) -> Result<Self, FrameworkError> {
        let server = texture
            .state
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("Graphics server was destroyed".to_string()))?;
        let unit = server.free_texture_unit().ok_or_else(|| {
            FrameworkError::Custom("Texture units limit exceeded!".to_string())
        })?;
        let target = gl_texture_target(texture.kind);
        server.set_texture(unit, target, Some(texture.texture));
        Ok(Self {
            server,
            unit,
            target,
        })
    }

    fn set_parameter(&self, parameter: u32, value: i32) {
        unsafe {
            self.server
                .gl
                .tex_parameter_i32(self.target, parameter, value);
        }
    }
}

impl Drop for TempBinding {
    fn drop(&mut self) {
        self.server.set_texture(self.unit, self.target, None);
    }
}

pub struct GlTexture {
    state: Weak<GlGraphicsServer>,
    texture: glow::Texture,
    name: String,
    kind: GpuTextureKind,
    min_filter: MinificationFilter,
    mag_filter: MagnificationFilter,
    s_wrap_mode: WrapMode,
    t_wrap_mode: WrapMode,
    r_wrap_mode: WrapMode,
    pixel_kind: PixelKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GlTexture {
    /// Creates new GPU texture of specified kind. The data, if any, must contain only the first
    /// mip level, cube faces go in +X, -X, +Y, -Y, +Z, -Z order. Render targets pass `None`.
    pub fn new(
        server: &GlGraphicsServer,
        desc: GpuTextureDescriptor,
    ) -> Result<Self, FrameworkError> {
        let texture = unsafe { server.gl.create_texture()? };

        let mut result = Self {
            state: server.weak(),
            texture,
            name: desc.name.to_owned(),
            kind: desc.kind,
            min_filter: desc.min_filter,
            mag_filter: desc.mag_filter,
            s_wrap_mode: desc.s_wrap_mode,
            t_wrap_mode: desc.t_wrap_mode,
            r_wrap_mode: desc.r_wrap_mode,
            pixel_kind: desc.pixel_kind,
            thread_mark: PhantomData,
        };

        result.set_data(desc.kind, desc.pixel_kind, desc.data)?;

        let binding = TempBinding::new(&result)?;
        binding.set_parameter(glow::TEXTURE_MAG_FILTER, desc.mag_filter.into_gl() as i32);
        binding.set_parameter(glow::TEXTURE_MIN_FILTER, desc.min_filter.into_gl() as i32);
        binding.set_parameter(glow::TEXTURE_WRAP_S, desc.s_wrap_mode.into_gl() as i32);
        binding.set_parameter(glow::TEXTURE_WRAP_T, desc.t_wrap_mode.into_gl() as i32);
        binding.set_parameter(glow::TEXTURE_WRAP_R, desc.r_wrap_mode.into_gl() as i32);
        binding.set_parameter(
            glow::TEXTURE_MAX_LEVEL,
            desc.mip_count.saturating_sub(1) as i32,
        );
        drop(binding);

        Ok(result)
    }

    pub fn bind(&self, server: &GlGraphicsServer, sampler_index: u32) {
        server.set_texture(sampler_index, gl_texture_target(self.kind), Some(self.texture));
    }

    pub fn id(&self) -> glow::Texture {
        self.texture
    }

    fn with_binding(&self, func: impl FnOnce(&TempBinding)) {
        match TempBinding::new(self) {
            Ok(binding) => func(&binding),
            Err(err) => Log::err(format!(
                "Unable to bind texture \"{}\". Reason: {err}",
                self.name
            )),
        }
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_texture(self.texture);
            }
        }
    }
}

impl GpuTexture for GlTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_minification_filter(&mut self, filter: MinificationFilter) {
        self.with_binding(|b| b.set_parameter(glow::TEXTURE_MIN_FILTER, filter.into_gl() as i32));
        self.min_filter = filter;
    }

    fn minification_filter(&self) -> MinificationFilter {
        self.min_filter
    }

    fn set_magnification_filter(&mut self, filter: MagnificationFilter) {
        self.with_binding(|b| b.set_parameter(glow::TEXTURE_MAG_FILTER, filter.into_gl() as i32));
        self.mag_filter = filter;
    }

    fn magnification_filter(&self) -> MagnificationFilter {
        self.mag_filter
    }

    fn set_wrap(&mut self, coordinate: Coordinate, wrap: WrapMode) {
        self.with_binding(|b| b.set_parameter(coordinate.into_gl(), wrap.into_gl() as i32));
        match coordinate {
            Coordinate::S => self.s_wrap_mode = wrap,
            Coordinate::T => self.t_wrap_mode = wrap,
            Coordinate::R => self.r_wrap_mode = wrap,
        }
    }

    fn wrap_mode(&self, coordinate: Coordinate) -> WrapMode {
        match coordinate {
            Coordinate::S => self.s_wrap_mode,
            Coordinate::T => self.t_wrap_mode,
            Coordinate::R => self.r_wrap_mode,
        }
    }

    fn set_border_color(&mut self, color: Color) {
        self.with_binding(|binding| unsafe {
            let color = color.as_frgba();
            binding.server.gl.tex_parameter_f32_slice(
                binding.target,
                glow::TEXTURE_BORDER_COLOR,
                &[color.x, color.y, color.z, color.w],
            );
        });
    }

    fn set_data(
        &mut self,
        kind: GpuTextureKind,
        pixel_kind: PixelKind,
        data: Option<&[u8]>,
    ) -> Result<(), FrameworkError> {
        validate_texture_data(kind, pixel_kind, data)?;

        self.kind = kind;
        self.pixel_kind = pixel_kind;

        let binding = TempBinding::new(self)?;
        let server = &binding.server;
        let PixelDescriptor {
            data_type,
            format,
            internal_format,
        } = pixel_descriptor(pixel_kind);

        server.drain_errors();

        unsafe {
            server
                .gl
                .pixel_store_i32(glow::UNPACK_ALIGNMENT, pixel_kind.unpack_alignment());

            match kind {
                GpuTextureKind::Line { length } => {
                    server.gl.tex_image_1d(
                        glow::TEXTURE_1D,
                        0,
                        internal_format as i32,
                        length as i32,
                        0,
                        format,
                        data_type,
                        data,
                    );
                }
                GpuTextureKind::Rectangle { width, height } => {
                    server.gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        internal_format as i32,
                        width as i32,
                        height as i32,
                        0,
                        format,
                        data_type,
                        data,
                    );
                }
                GpuTextureKind::Cube { width, height } => {
                    let bytes_per_face = pixel_kind.size_bytes() * width * height;
                    for (index, face) in CubeMapFace::ALL.iter().enumerate() {
                        let face_pixels = data.map(|data| {
                            &data[index * bytes_per_face..(index + 1) * bytes_per_face]
                        });
                        server.gl.tex_image_2d(
                            face.into_gl(),
                            0,
                            internal_format as i32,
                            width as i32,
                            height as i32,
                            0,
                            format,
                            data_type,
                            face_pixels,
                        );
                    }
                }
                GpuTextureKind::Volume {
                    width,
                    height,
                    depth,
                } => {
                    server.gl.tex_image_3d(
                        glow::TEXTURE_3D,
                        0,
                        internal_format as i32,
                        width as i32,
                        height as i32,
                        depth as i32,
                        0,
                        format,
                        data_type,
                        data,
                    );
                }
            }
        }

        if let Some(status) = server.last_error() {
            return Err(FrameworkError::TextureAllocationFailed {
                name: self.name.clone(),
                status,
            });
        }

        Ok(())
    }

    fn read_pixels(&self) -> Vec<u8> {
        let mut bytes = vec![0; image_size_bytes(self.pixel_kind, self.kind)];
        if bytes.is_empty() {
            return bytes;
        }
        if let GpuTextureKind::Cube { .. } = self.kind {
            // Faces must be fetched one by one, return them in upload order.
            let face_size = bytes.len() / 6;
            let desc = pixel_descriptor(self.pixel_kind);
            self.with_binding(|binding| unsafe {
                for (chunk, face) in bytes.chunks_mut(face_size).zip(CubeMapFace::ALL) {
                    binding.server.gl.get_tex_image(
                        face.into_gl(),
                        0,
                        desc.format,
                        desc.data_type,
                        PixelPackData::Slice(chunk),
                    );
                }
            });
        } else {
            let desc = pixel_descriptor(self.pixel_kind);
            self.with_binding(|binding| unsafe {
                binding.server.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
                binding.server.gl.get_tex_image(
                    binding.target,
                    0,
                    desc.format,
                    desc.data_type,
                    PixelPackData::Slice(&mut bytes),
                );
            });
        }
        bytes
    }

    fn kind(&self) -> GpuTextureKind {
        self.kind
    }

    fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }
}
