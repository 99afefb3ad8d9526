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

use crate::server::SharedState;
use half::f16;
use std::{any::Any, rc::Rc};
use umbra_core::color::Color;
use umbra_graphics::{
    error::FrameworkError,
    gpu_texture::{
        image_size_bytes, validate_texture_data, Coordinate, CubeMapFace, GpuTexture,
        GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter, PixelKind,
        WrapMode,
    },
};

/// Status reported when a texture exceeds the configured size limit. Matches `GL_INVALID_VALUE`
/// so logs look the same for both backends.
pub const ALLOCATION_FAILED_STATUS: u32 = 0x0501;

/// Texture that keeps its first mip level in CPU memory.
pub struct HeadlessTexture {
    shared: Rc<SharedState>,
    name: String,
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
    min_filter: MinificationFilter,
    mag_filter: MagnificationFilter,
    s_wrap_mode: WrapMode,
    t_wrap_mode: WrapMode,
    r_wrap_mode: WrapMode,
    border_color: Color,
    pub(crate) pixels: Vec<u8>,
}

impl HeadlessTexture {
    pub(crate) fn new(
        shared: Rc<SharedState>,
        desc: GpuTextureDescriptor,
    ) -> Result<Self, FrameworkError> {
        let mut texture = Self {
            shared,
            name: desc.name.to_owned(),
            kind: desc.kind,
            pixel_kind: desc.pixel_kind,
            min_filter: desc.min_filter,
            mag_filter: desc.mag_filter,
            s_wrap_mode: desc.s_wrap_mode,
            t_wrap_mode: desc.t_wrap_mode,
            r_wrap_mode: desc.r_wrap_mode,
            border_color: Color::TRANSPARENT,
            pixels: Vec::new(),
        };
        // Counted before the upload, a failed upload drops the texture and undoes it.
        texture.shared.live_textures.set(texture.shared.live_textures.get() + 1);
        texture.set_data(desc.kind, desc.pixel_kind, desc.data)?;
        Ok(texture)
    }

    pub fn border_color(&self) -> Color {
        self.border_color
    }

    fn face_size_bytes(&self) -> usize {
        let (width, height) = self.kind.rectangle_size();
        width * height * self.pixel_kind.size_bytes()
    }

    /// Byte range of the image a frame buffer writes into. Cube maps expose one face at a time.
    fn target_range(&self, face: CubeMapFace) -> std::ops::Range<usize> {
        match self.kind {
            GpuTextureKind::Cube { .. } => {
                let face_size = self.face_size_bytes();
                let index = CubeMapFace::ALL
                    .iter()
                    .position(|f| *f == face)
                    .unwrap_or_default();
                index * face_size..(index + 1) * face_size
            }
            _ => 0..self.pixels.len(),
        }
    }

    pub(crate) fn fill_color(&mut self, face: CubeMapFace, color: Color) {
        let pixel = encode_color(self.pixel_kind, color);
        self.fill(face, &pixel);
    }

    pub(crate) fn fill_depth_stencil(
        &mut self,
        face: CubeMapFace,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        let range = self.target_range(face);
        let pixel_kind = self.pixel_kind;
        for pixel in self.pixels[range].chunks_exact_mut(pixel_kind.size_bytes()) {
            write_depth_stencil(pixel_kind, pixel, depth, stencil);
        }
    }

    fn fill(&mut self, face: CubeMapFace, pixel: &[u8]) {
        if pixel.is_empty() {
            return;
        }
        let range = self.target_range(face);
        for dest in self.pixels[range].chunks_exact_mut(pixel.len()) {
            dest.copy_from_slice(pixel);
        }
    }
}

impl Drop for HeadlessTexture {
    fn drop(&mut self) {
        self.shared
            .live_textures
            .set(self.shared.live_textures.get().saturating_sub(1));
    }
}

fn half_bytes(value: f32) -> [u8; 2] {
    f16::from_f32(value).to_le_bytes()
}

// Packed unsigned float formats keep the exponent and the top of the f16 mantissa.
fn pack_r11g11b10(r: f32, g: f32, b: f32) -> u32 {
    let bits = |v: f32| f16::from_f32(v.max(0.0)).to_bits() as u32;
    let r = (bits(r) >> 4) & 0x7FF;
    let g = (bits(g) >> 4) & 0x7FF;
    let b = (bits(b) >> 5) & 0x3FF;
    r | (g << 11) | (b << 22)
}

/// Encodes a single pixel of the given format. Depth formats are not colors and produce nothing.
pub fn encode_color(pixel_kind: PixelKind, color: Color) -> Vec<u8> {
    let rgba = color.as_frgba();
    match pixel_kind {
        PixelKind::R8 => vec![color.r],
        PixelKind::RG8 => vec![color.r, color.g],
        PixelKind::RGB8 => vec![color.r, color.g, color.b],
        PixelKind::RGBA8 | PixelKind::SRGBA8 => vec![color.r, color.g, color.b, color.a],
        PixelKind::R16F | PixelKind::RG16F | PixelKind::RGB16F | PixelKind::RGBA16F => rgba
            .iter()
            .take(pixel_kind.channel_count())
            .flat_map(|c| half_bytes(*c))
            .collect(),
        PixelKind::R32F | PixelKind::RGBA32F => rgba
            .iter()
            .take(pixel_kind.channel_count())
            .flat_map(|c| c.to_le_bytes())
            .collect(),
        PixelKind::R11G11B10F => pack_r11g11b10(rgba.x, rgba.y, rgba.z).to_le_bytes().to_vec(),
        PixelKind::D16 | PixelKind::D24S8 | PixelKind::D32F => Vec::new(),
    }
}

fn write_depth_stencil(
    pixel_kind: PixelKind,
    pixel: &mut [u8],
    depth: Option<f32>,
    stencil: Option<i32>,
) {
    match pixel_kind {
        PixelKind::D16 => {
            if let Some(depth) = depth {
                let value = (depth.clamp(0.0, 1.0) * u16::MAX as f32) as u16;
                pixel.copy_from_slice(&value.to_le_bytes());
            }
        }
        PixelKind::D32F => {
            if let Some(depth) = depth {
                pixel.copy_from_slice(&depth.to_le_bytes());
            }
        }
        PixelKind::D24S8 => {
            // Same layout as GL_UNSIGNED_INT_24_8: depth in the upper 24 bits.
            let mut packed = u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]);
            if let Some(depth) = depth {
                let depth = (depth.clamp(0.0, 1.0) * 0x00FF_FFFF as f32) as u32;
                packed = (packed & 0xFF) | (depth << 8);
            }
            if let Some(stencil) = stencil {
                packed = (packed & !0xFF) | (stencil as u32 & 0xFF);
            }
            pixel.copy_from_slice(&packed.to_le_bytes());
        }
        _ => (),
    }
}

impl GpuTexture for HeadlessTexture {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_minification_filter(&mut self, min_filter: MinificationFilter) {
        self.min_filter = min_filter;
    }

    fn minification_filter(&self) -> MinificationFilter {
        self.min_filter
    }

    fn set_magnification_filter(&mut self, mag_filter: MagnificationFilter) {
        self.mag_filter = mag_filter;
    }

    fn magnification_filter(&self) -> MagnificationFilter {
        self.mag_filter
    }

    fn set_wrap(&mut self, coordinate: Coordinate, wrap: WrapMode) {
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
        self.border_color = color;
    }

    fn set_data(
        &mut self,
        kind: GpuTextureKind,
        pixel_kind: PixelKind,
        data: Option<&[u8]>,
    ) -> Result<(), FrameworkError> {
        validate_texture_data(kind, pixel_kind, data)?;

        if let Some(max_size) = self.shared.max_texture_size.get() {
            let (width, height) = kind.rectangle_size();
            if width > max_size || height > max_size {
                return Err(FrameworkError::TextureAllocationFailed {
                    name: self.name.clone(),
                    status: ALLOCATION_FAILED_STATUS,
                });
            }
        }

        self.pixels = match data {
            Some(data) => data.to_vec(),
            None => vec![0; image_size_bytes(pixel_kind, kind)],
        };
        self.kind = kind;
        self.pixel_kind = pixel_kind;

        Ok(())
    }

    fn read_pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    fn kind(&self) -> GpuTextureKind {
        self.kind
    }

    fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_color() {
        assert_eq!(encode_color(PixelKind::R8, Color::WHITE), vec![255]);
        assert_eq!(
            encode_color(PixelKind::RGBA8, Color::from_rgba(1, 2, 3, 4)),
            vec![1, 2, 3, 4]
        );
        assert_eq!(encode_color(PixelKind::RG16F, Color::WHITE).len(), 4);
        assert_eq!(
            encode_color(PixelKind::RGBA16F, Color::WHITE)[0..2],
            f16::from_f32(1.0).to_le_bytes()
        );
        assert_eq!(
            encode_color(PixelKind::R32F, Color::BLACK),
            0.0f32.to_le_bytes().to_vec()
        );
        assert!(encode_color(PixelKind::D24S8, Color::WHITE).is_empty());
    }

    #[test]
    fn test_pack_r11g11b10() {
        assert_eq!(pack_r11g11b10(0.0, 0.0, 0.0), 0);
        // 1.0 is 0x3C00 in f16: exponent 15, zero mantissa.
        let packed = pack_r11g11b10(1.0, 1.0, 1.0);
        assert_eq!(packed & 0x7FF, 0x3C0);
        assert_eq!((packed >> 11) & 0x7FF, 0x3C0);
        assert_eq!(packed >> 22, 0x1E0);
    }

    #[test]
    fn test_depth_stencil_packing() {
        let mut pixel = [0u8; 4];
        write_depth_stencil(PixelKind::D24S8, &mut pixel, Some(1.0), Some(3));
        assert_eq!(u32::from_le_bytes(pixel), (0x00FF_FFFF << 8) | 3);

        write_depth_stencil(PixelKind::D24S8, &mut pixel, None, Some(7));
        assert_eq!(u32::from_le_bytes(pixel), (0x00FF_FFFF << 8) | 7);

        let mut pixel = [0u8; 4];
        write_depth_stencil(PixelKind::D32F, &mut pixel, Some(0.5), None);
        assert_eq!(f32::from_le_bytes(pixel), 0.5);
    }
}
