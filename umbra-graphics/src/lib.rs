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

//! Backend-agnostic GPU abstraction used by the renderer. Backends (OpenGL, headless) implement
//! the traits of this crate, the renderer itself never talks to a graphics API directly.

pub use umbra_core as core;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

pub mod error;
pub mod framebuffer;
pub mod geometry_buffer;
pub mod gpu_program;
pub mod gpu_texture;
pub mod server;
pub mod stats;

#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum CompareFunc {
    /// Never passes.
    Never,

    /// Passes if the incoming value is less than the stored value.
    Less,

    /// Passes if the incoming value is equal to the stored value.
    Equal,

    /// Passes if the incoming value is less than or equal to the stored value.
    LessOrEqual,

    /// Passes if the incoming value is greater than the stored value.
    Greater,

    /// Passes if the incoming value is not equal to the stored value.
    NotEqual,

    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterOrEqual,

    /// Always passes.
    Always,
}

impl Default for CompareFunc {
    fn default() -> Self {
        Self::LessOrEqual
    }
}

#[derive(
    Copy,
    Clone,
    Hash,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

impl Default for BlendFactor {
    fn default() -> Self {
        Self::Zero
    }
}

#[derive(Copy, Clone, Hash, PartialOrd, PartialEq, Eq, Ord, Serialize, Deserialize, Debug)]
pub enum BlendMode {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::Add
    }
}

#[derive(
    Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug,
)]
pub struct BlendEquation {
    pub rgb: BlendMode,
    pub alpha: BlendMode,
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendFunc {
    pub sfactor: BlendFactor,
    pub dfactor: BlendFactor,
    pub alpha_sfactor: BlendFactor,
    pub alpha_dfactor: BlendFactor,
}

impl BlendFunc {
    pub fn new(sfactor: BlendFactor, dfactor: BlendFactor) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor: sfactor,
            alpha_dfactor: dfactor,
        }
    }

    pub fn new_separate(
        sfactor: BlendFactor,
        dfactor: BlendFactor,
        alpha_sfactor: BlendFactor,
        alpha_dfactor: BlendFactor,
    ) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor,
            alpha_dfactor,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            sfactor: BlendFactor::One,
            dfactor: BlendFactor::Zero,
            alpha_sfactor: BlendFactor::One,
            alpha_dfactor: BlendFactor::Zero,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all(true)
    }
}

impl ColorMask {
    pub fn all(value: bool) -> Self {
        Self {
            red: value,
            green: value,
            blue: value,
            alpha: value,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct StencilFunc {
    pub func: CompareFunc,
    pub ref_value: u32,
    pub mask: u32,
}

impl Default for StencilFunc {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            ref_value: 0,
            mask: 0xFFFF_FFFF,
        }
    }
}

#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    Eq,
    AsRefStr,
    EnumString,
    VariantNames,
)]
pub enum StencilAction {
    /// Keeps the current value.
    Keep,

    /// Sets the stencil buffer value to 0.
    Zero,

    /// Sets the stencil buffer value to ref value.
    Replace,

    /// Increments the current stencil buffer value, clamps to the maximum.
    Incr,

    /// Increments the current stencil buffer value, wraps to zero.
    IncrWrap,

    /// Decrements the current stencil buffer value, clamps to 0.
    Decr,

    /// Decrements the current stencil buffer value, wraps to the maximum.
    DecrWrap,

    /// Bitwise inverts the current stencil buffer value.
    Invert,
}

impl Default for StencilAction {
    fn default() -> Self {
        Self::Keep
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub struct StencilOp {
    pub fail: StencilAction,
    pub zfail: StencilAction,
    pub zpass: StencilAction,
    pub write_mask: u32,
}

impl Default for StencilOp {
    fn default() -> Self {
        Self {
            fail: Default::default(),
            zfail: Default::default(),
            zpass: Default::default(),
            write_mask: 0xFFFF_FFFF,
        }
    }
}

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Serialize, Deserialize, Eq)]
pub enum CullFace {
    Back,
    Front,
}

impl Default for CullFace {
    fn default() -> Self {
        Self::Back
    }
}

impl CullFace {
    /// Returns the opposite face. Shadow passes cull front faces instead of back faces.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::Front => Self::Back,
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, Eq)]
pub struct BlendParameters {
    pub func: BlendFunc,
    pub equation: BlendEquation,
}

impl BlendParameters {
    /// Standard alpha blending, used for transparent geometry.
    pub fn alpha_blend() -> Self {
        Self {
            func: BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
            equation: Default::default(),
        }
    }

    /// Additive blending, used to accumulate light contributions.
    pub fn additive() -> Self {
        Self {
            func: BlendFunc::new(BlendFactor::One, BlendFactor::One),
            equation: Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, Copy, Eq)]
pub struct ScissorBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Complete pipeline state of a single draw call. Every draw call carries its own parameters,
/// so nothing leaks from one pass to the next.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Eq)]
pub struct DrawParameters {
    pub cull_face: Option<CullFace>,
    pub color_write: ColorMask,
    pub depth_write: bool,
    pub stencil_test: Option<StencilFunc>,
    pub depth_test: Option<CompareFunc>,
    pub blend: Option<BlendParameters>,
    pub stencil_op: StencilOp,
    pub scissor_box: Option<ScissorBox>,
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            cull_face: Some(CullFace::Back),
            color_write: Default::default(),
            depth_write: true,
            stencil_test: None,
            depth_test: Some(CompareFunc::Less),
            blend: None,
            stencil_op: Default::default(),
            scissor_box: None,
        }
    }
}

impl DrawParameters {
    /// Parameters of a full-screen pass: no culling, no depth test, no depth writes, no
    /// blending.
    pub fn full_screen() -> Self {
        Self {
            cull_face: None,
            color_write: Default::default(),
            depth_write: false,
            stencil_test: None,
            depth_test: None,
            blend: None,
            stencil_op: Default::default(),
            scissor_box: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ElementRange {
    #[default]
    Full,
    Specific {
        offset: usize,
        count: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ElementKind {
    Triangle,
    Line,
    Point,
}

impl ElementKind {
    pub fn index_per_element(self) -> usize {
        match self {
            ElementKind::Triangle => 3,
            ElementKind::Line => 2,
            ElementKind::Point => 1,
        }
    }
}

impl ElementRange {
    /// Resolves the range against the total amount of elements in a buffer. Returns
    /// `(offset, count)` or an error if the range is out of bounds.
    pub fn resolve(
        self,
        total: usize,
    ) -> Result<(usize, usize), crate::error::FrameworkError> {
        let (offset, count) = match self {
            ElementRange::Full => (0, total),
            ElementRange::Specific { offset, count } => (offset, count),
        };
        let end = offset + count;
        if end > total {
            Err(crate::error::FrameworkError::InvalidElementRange {
                start: offset,
                end,
                total,
            })
        } else {
            Ok((offset, count))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_draw_parameters_defaults() {
        let params = DrawParameters::default();
        assert_eq!(params.cull_face, Some(CullFace::Back));
        assert_eq!(params.depth_test, Some(CompareFunc::Less));
        assert!(params.depth_write);
        assert!(params.blend.is_none());

        let full_screen = DrawParameters::full_screen();
        assert!(full_screen.cull_face.is_none());
        assert!(full_screen.depth_test.is_none());
        assert!(!full_screen.depth_write);
    }

    #[test]
    fn test_cull_face_flip() {
        assert_eq!(CullFace::Back.flipped(), CullFace::Front);
        assert_eq!(CullFace::Front.flipped(), CullFace::Back);
    }

    #[test]
    fn test_element_range_resolve() {
        assert_eq!(ElementRange::Full.resolve(10).unwrap(), (0, 10));
        assert_eq!(
            ElementRange::Specific {
                offset: 2,
                count: 3
            }
            .resolve(10)
            .unwrap(),
            (2, 3)
        );
        assert!(ElementRange::Specific {
            offset: 8,
            count: 3
        }
        .resolve(10)
        .is_err());
        assert_eq!(ElementKind::Triangle.index_per_element(), 3);
    }

    #[test]
    fn test_compare_func_from_str() {
        assert_eq!(CompareFunc::from_str("Less").unwrap(), CompareFunc::Less);
        assert_eq!(CompareFunc::Always.as_ref(), "Always");
    }
}
