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

use crate::{
    core::{
        algebra::{Matrix4, Vector2, Vector3, Vector4},
        color::Color,
        sstorage::ImmutableString,
    },
    error::FrameworkError,
};
use serde::{Deserialize, Serialize};
use std::{any::Any, marker::PhantomData};

pub trait GpuProgram: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn name(&self) -> &str;
    /// Looks up an active uniform. Uniforms that were optimized out by the shader compiler are
    /// reported as [`FrameworkError::UnableToFindShaderUniform`].
    fn uniform_location(&self, name: &ImmutableString) -> Result<UniformLocation, FrameworkError>;

    fn has_uniform(&self, name: &ImmutableString) -> bool {
        self.uniform_location(name).is_ok()
    }
}

/// Backend-specific handle of a uniform of a particular program. It is meaningless for any other
/// program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub id: usize,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    pub thread_mark: PhantomData<*const u8>,
}

impl UniformLocation {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            thread_mark: PhantomData,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    FloatArray(Vec<f32>),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Vector3Array(Vec<Vector3<f32>>),
    Vector4Array(Vec<Vector4<f32>>),
    Matrix4(Matrix4<f32>),
    Matrix4Array(Vec<Matrix4<f32>>),
    /// Uploaded as a linear `vec4` with components in the `[0; 1]` range.
    Color(Color),
}

macro_rules! define_uniform_value_from {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

define_uniform_value_from!(
    bool => Bool,
    i32 => Int,
    f32 => Float,
    Vec<f32> => FloatArray,
    Vector2<f32> => Vector2,
    Vector3<f32> => Vector3,
    Vector4<f32> => Vector4,
    Vec<Vector3<f32>> => Vector3Array,
    Vec<Vector4<f32>> => Vector4Array,
    Matrix4<f32> => Matrix4,
    Vec<Matrix4<f32>> => Matrix4Array,
    Color => Color
);

/// Texture bound to a sampler when a material does not provide one.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum SamplerFallback {
    /// A 1x1px white texture.
    #[default]
    White,
    /// A 1x1px texture with (0, 1, 0) vector.
    Normal,
    /// A 1x1px black texture.
    Black,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_uniform_value_conversions() {
        assert_eq!(UniformValue::from(1.5f32), UniformValue::Float(1.5));
        assert_eq!(UniformValue::from(true), UniformValue::Bool(true));
        assert_eq!(
            UniformValue::from(Color::RED),
            UniformValue::Color(Color::RED)
        );
        assert_eq!(
            UniformValue::from(vec![Matrix4::identity(); 2]),
            UniformValue::Matrix4Array(vec![Matrix4::identity(); 2])
        );
    }
}
