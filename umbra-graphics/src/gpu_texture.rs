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

use crate::{core::color::Color, error::FrameworkError};
use bytemuck::Pod;
use std::any::Any;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpuTextureKind {
    Line {
        length: usize,
    },
    Rectangle {
        width: usize,
        height: usize,
    },
    Cube {
        width: usize,
        height: usize,
    },
    Volume {
        width: usize,
        height: usize,
        depth: usize,
    },
}

impl GpuTextureKind {
    /// Width and height of the first mip level (or of a single cube face).
    pub fn rectangle_size(&self) -> (usize, usize) {
        match *self {
            Self::Line { length } => (length, 1),
            Self::Rectangle { width, height }
            | Self::Cube { width, height }
            | Self::Volume { width, height, .. } => (width, height),
        }
    }

    /// Amount of pixels in the first mip level, all faces and slices included.
    pub fn pixel_count(&self) -> usize {
        match *self {
            Self::Line { length } => length,
            Self::Rectangle { width, height } => width * height,
            Self::Cube { width, height } => 6 * width * height,
            Self::Volume {
                width,
                height,
                depth,
            } => width * height * depth,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelKind {
    R8,
    R16F,
    R32F,
    RG8,
    RG16F,
    RGB8,
    RGBA8,
    SRGBA8,
    RGB16F,
    RGBA16F,
    RGBA32F,
    R11G11B10F,
    D16,
    D24S8,
    D32F,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelElementKind {
    Float,
    NormalizedUnsignedInteger,
}

impl PixelKind {
    pub fn unpack_alignment(self) -> i32 {
        match self {
            Self::RGBA16F
            | Self::RGB16F
            | Self::RGBA32F
            | Self::RGBA8
            | Self::SRGBA8
            | Self::RG16F
            | Self::D24S8
            | Self::D32F
            | Self::R32F => 4,
            Self::RG8 | Self::D16 | Self::R16F => 2,
            Self::R8 | Self::RGB8 | Self::R11G11B10F => 1,
        }
    }

    pub fn element_kind(self) -> PixelElementKind {
        match self {
            Self::R16F
            | Self::R32F
            | Self::RG16F
            | Self::RGB16F
            | Self::RGBA16F
            | Self::RGBA32F
            | Self::R11G11B10F
            | Self::D32F => PixelElementKind::Float,
            Self::R8
            | Self::RG8
            | Self::RGB8
            | Self::RGBA8
            | Self::SRGBA8
            | Self::D16
            | Self::D24S8 => PixelElementKind::NormalizedUnsignedInteger,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::D16 | Self::D24S8 | Self::D32F)
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24S8)
    }

    /// Amount of color channels (depth formats have one).
    pub fn channel_count(self) -> usize {
        match self {
            Self::R8 | Self::R16F | Self::R32F | Self::D16 | Self::D24S8 | Self::D32F => 1,
            Self::RG8 | Self::RG16F => 2,
            Self::RGB8 | Self::RGB16F | Self::R11G11B10F => 3,
            Self::RGBA8 | Self::SRGBA8 | Self::RGBA16F | Self::RGBA32F => 4,
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            Self::RGBA32F => 16,
            Self::RGBA16F => 8,
            Self::RGB16F => 6,
            Self::RGBA8
            | Self::SRGBA8
            | Self::RG16F
            | Self::D24S8
            | Self::D32F
            | Self::R32F
            | Self::R11G11B10F => 4,
            Self::RGB8 => 3,
            Self::RG8 | Self::D16 | Self::R16F => 2,
            Self::R8 => 1,
        }
    }
}

pub fn image_size_bytes(pixel_kind: PixelKind, kind: GpuTextureKind) -> usize {
    pixel_kind.size_bytes() * kind.pixel_count()
}

#[derive(Default, Copy, Clone, PartialOrd, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
pub enum MagnificationFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Default, Copy, Clone, PartialOrd, PartialEq, Eq, Hash, Debug)]
pub enum MinificationFilter {
    Nearest,
    NearestMipMapNearest,
    NearestMipMapLinear,
    #[default]
    Linear,
    LinearMipMapNearest,
    LinearMipMapLinear,
}

#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Coordinate {
    S,
    T,
    R,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    pub const ALL: [CubeMapFace; 6] = [
        CubeMapFace::PositiveX,
        CubeMapFace::NegativeX,
        CubeMapFace::PositiveY,
        CubeMapFace::NegativeY,
        CubeMapFace::PositiveZ,
        CubeMapFace::NegativeZ,
    ];
}

#[derive(Clone)]
pub struct GpuTextureDescriptor<'a> {
    /// Debug name, reported in allocation errors.
    pub name: &'a str,
    pub kind: GpuTextureKind,
    pub pixel_kind: PixelKind,
    pub min_filter: MinificationFilter,
    pub mag_filter: MagnificationFilter,
    pub mip_count: usize,
    pub s_wrap_mode: WrapMode,
    pub t_wrap_mode: WrapMode,
    pub r_wrap_mode: WrapMode,
    pub data: Option<&'a [u8]>,
}

impl Default for GpuTextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            name: "",
            kind: GpuTextureKind::Rectangle {
                width: 1,
                height: 1,
            },
            pixel_kind: PixelKind::RGBA8,
            min_filter: Default::default(),
            mag_filter: Default::default(),
            mip_count: 1,
            s_wrap_mode: Default::default(),
            t_wrap_mode: Default::default(),
            r_wrap_mode: Default::default(),
            data: None,
        }
    }
}

pub trait GpuTexture: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn name(&self) -> &str;
    fn set_minification_filter(&mut self, min_filter: MinificationFilter);
    fn minification_filter(&self) -> MinificationFilter;
    fn set_magnification_filter(&mut self, mag_filter: MagnificationFilter);
    fn magnification_filter(&self) -> MagnificationFilter;
    fn set_wrap(&mut self, coordinate: Coordinate, wrap: WrapMode);
    fn wrap_mode(&self, coordinate: Coordinate) -> WrapMode;
    fn set_border_color(&mut self, color: Color);
    /// Replaces the contents and (possibly) the size and format of the texture. Data, if any,
    /// must contain exactly the first mip level.
    fn set_data(
        &mut self,
        kind: GpuTextureKind,
        pixel_kind: PixelKind,
        data: Option<&[u8]>,
    ) -> Result<(), FrameworkError>;
    /// Reads the first mip level back to the CPU.
    fn read_pixels(&self) -> Vec<u8>;
    fn kind(&self) -> GpuTextureKind;
    fn pixel_kind(&self) -> PixelKind;
}

impl dyn GpuTexture {
    pub fn read_pixels_of_type<T>(&self) -> Vec<T>
    where
        T: Pod,
    {
        bytemuck::pod_collect_to_vec(&self.read_pixels())
    }
}

/// Checks that the given data matches the first mip level of a texture of the given kind.
pub fn validate_texture_data(
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
    data: Option<&[u8]>,
) -> Result<(), FrameworkError> {
    if let Some(data) = data {
        let expected_data_size = image_size_bytes(pixel_kind, kind);
        if data.len() != expected_data_size {
            return Err(FrameworkError::InvalidTextureData {
                expected_data_size,
                actual_data_size: data.len(),
            });
        }
    }
    Ok(())
}
