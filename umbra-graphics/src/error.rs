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

//! Contains all possible errors that may occur during rendering, initialization of
//! renderer structures, or GAPI.

use std::ffi::NulError;

/// Set of possible renderer errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// Compilation of a shader has failed.
    #[error(
        "Compilation of \"{}\" shader has failed: {}",
        shader_name,
        error_message
    )]
    ShaderCompilationFailed {
        /// Name of shader.
        shader_name: String,
        /// Compilation error message.
        error_message: String,
    },
    /// Means that shader link stage failed, exact reason is inside `error_message`
    #[error("Linking shader \"{}\" failed: {}", shader_name, error_message)]
    ShaderLinkingFailed {
        /// Name of shader.
        shader_name: String,
        /// Linking error message.
        error_message: String,
    },
    /// Shader source contains invalid characters.
    #[error("Shader source contains invalid characters")]
    FaultyShaderSource,
    /// A shader source with the given id is not registered.
    #[error("There is no shader source with id {0}")]
    UnknownShaderSource(String),
    /// There is no such shader uniform (could be optimized out).
    #[error("There is no such shader uniform: {0}")]
    UnableToFindShaderUniform(String),
    /// Texture has invalid data - insufficient size.
    #[error(
        "Texture has invalid data (insufficent size): expected {}, actual: {}",
        expected_data_size,
        actual_data_size
    )]
    InvalidTextureData {
        /// Expected data size in bytes.
        expected_data_size: usize,
        /// Actual data size in bytes.
        actual_data_size: usize,
    },
    /// None variant was passed as texture data, but the texture kind requires it.
    #[error("None variant was passed as texture data, but it is required.")]
    EmptyTextureData,
    /// The backend was unable to allocate storage for a texture.
    #[error("Unable to allocate texture \"{}\". Status: {:#06X}", name, status)]
    TextureAllocationFailed {
        /// Debug name of the texture.
        name: String,
        /// Platform status code (GL error code for the OpenGL backend).
        status: u32,
    },
    /// Means that you tried to draw element range from GeometryBuffer that
    /// does not have enough elements.
    #[error(
        "Tried to draw element from GeometryBuffer that does not have enough elements:
        start: {},
        end: {},
        total: {}
        ",
        start,
        end,
        total
    )]
    InvalidElementRange {
        /// First index.
        start: usize,
        /// Last index.
        end: usize,
        /// Total amount of triangles.
        total: usize,
    },
    /// Means that attribute descriptor tries to define an attribute that does
    /// not exists in vertex, or it does not match size. For example you have vertex:
    ///   pos: float2,
    ///   normal: float3
    /// But you described second attribute as Float4, then you'll get this error.
    #[error("An attribute descriptor tried to define an attribute that does not exist in vertex or doesn't match size.")]
    InvalidAttributeDescriptor,
    /// Framebuffer is invalid.
    #[error("Framebuffer is invalid")]
    InvalidFrameBuffer,
    /// The backend failed to construct a complete frame buffer.
    #[error(
        "Failed to construct frame buffer \"{}\". Status: {:#06X}",
        name,
        status
    )]
    FailedToConstructFrameBuffer {
        /// Debug name of the frame buffer.
        name: String,
        /// Platform status code (framebuffer completeness status for the OpenGL backend).
        status: u32,
    },
    /// A named render target was requested but it was never created (or already released).
    #[error("Resource \"{}\" was not found", name)]
    ResourceNotFound {
        /// Name of the missing resource.
        name: String,
    },
    /// Custom error. Usually used for internal errors.
    #[error("Custom error: {0}")]
    Custom(String),
}

impl FrameworkError {
    /// Shortcut for [`FrameworkError::ResourceNotFound`].
    pub fn resource_not_found<S: AsRef<str>>(name: S) -> Self {
        Self::ResourceNotFound {
            name: name.as_ref().to_owned(),
        }
    }
}

impl From<NulError> for FrameworkError {
    fn from(_: NulError) -> Self {
        Self::FaultyShaderSource
    }
}

impl From<String> for FrameworkError {
    fn from(v: String) -> Self {
        Self::Custom(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_messages_carry_names_and_status() {
        let err = FrameworkError::FailedToConstructFrameBuffer {
            name: "GBuffer".to_string(),
            status: 0x8CD6,
        };
        assert_eq!(
            err.to_string(),
            "Failed to construct frame buffer \"GBuffer\". Status: 0x8CD6"
        );

        let err = FrameworkError::TextureAllocationFailed {
            name: "SceneDepth".to_string(),
            status: 0x0501,
        };
        assert_eq!(
            err.to_string(),
            "Unable to allocate texture \"SceneDepth\". Status: 0x0501"
        );

        assert_eq!(
            FrameworkError::resource_not_found("Bloom").to_string(),
            "Resource \"Bloom\" was not found"
        );
        assert!(matches!(
            FrameworkError::from("oops".to_string()),
            FrameworkError::Custom(_)
        ));
    }
}
