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
    core::{color::Color, math::Rect},
    error::FrameworkError,
    geometry_buffer::{DrawCallStatistics, GeometryBuffer},
    gpu_program::{GpuProgram, UniformLocation, UniformValue},
    gpu_texture::{CubeMapFace, GpuTexture},
    DrawParameters, ElementRange,
};
use std::{any::Any, cell::RefCell, rc::Rc};

#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq)]
pub enum AttachmentKind {
    Color,
    DepthStencil,
    Depth,
}

#[derive(Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub texture: Rc<RefCell<dyn GpuTexture>>,
}

impl Attachment {
    pub fn color(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::Color,
            texture,
        }
    }

    pub fn depth(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::Depth,
            texture,
        }
    }

    pub fn depth_stencil(texture: Rc<RefCell<dyn GpuTexture>>) -> Self {
        Self {
            kind: AttachmentKind::DepthStencil,
            texture,
        }
    }
}

/// A single resource bound to a program for one draw call. Texture units are assigned in the
/// order textures appear in the binding list.
pub enum ResourceBinding {
    Texture {
        texture: Rc<RefCell<dyn GpuTexture>>,
        shader_location: UniformLocation,
    },
    Uniform {
        shader_location: UniformLocation,
        value: UniformValue,
    },
}

impl ResourceBinding {
    pub fn texture(
        texture: &Rc<RefCell<dyn GpuTexture>>,
        shader_location: &UniformLocation,
    ) -> Self {
        Self::Texture {
            texture: texture.clone(),
            shader_location: shader_location.clone(),
        }
    }

    pub fn uniform(shader_location: &UniformLocation, value: impl Into<UniformValue>) -> Self {
        Self::Uniform {
            shader_location: shader_location.clone(),
            value: value.into(),
        }
    }
}

pub trait FrameBuffer: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn name(&self) -> &str;
    fn color_attachments(&self) -> &[Attachment];
    fn depth_attachment(&self) -> Option<&Attachment>;
    /// Selects the face of a cube map attachment that subsequent draws render into.
    fn set_cubemap_face(&mut self, attachment_index: usize, face: CubeMapFace);
    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    );
    /// Issues one draw call. Every pipeline state the call depends on comes from `params`, the
    /// state left behind by a previous draw is never relied upon.
    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
    ) -> Result<DrawCallStatistics, FrameworkError>;
}

impl dyn FrameBuffer {
    /// Returns the color attachment texture at the given index.
    pub fn color_texture(&self, index: usize) -> Option<Rc<RefCell<dyn GpuTexture>>> {
        self.color_attachments()
            .get(index)
            .map(|attachment| attachment.texture.clone())
    }
}
