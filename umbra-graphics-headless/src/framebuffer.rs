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
    program::HeadlessProgram,
    server::{DrawCallRecord, SharedState},
    texture::HeadlessTexture,
};
use std::{any::Any, rc::Rc};
use umbra_core::{color::Color, math::Rect};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, AttachmentKind, FrameBuffer, ResourceBinding},
    geometry_buffer::{DrawCallStatistics, GeometryBuffer},
    gpu_program::GpuProgram,
    gpu_texture::{CubeMapFace, GpuTexture},
    DrawParameters, ElementRange,
};

/// `GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT`
pub const INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;
/// `GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT`
pub const MISSING_ATTACHMENT: u32 = 0x8CD7;
/// `GL_FRAMEBUFFER_INCOMPLETE_DIMENSIONS`
pub const INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;

pub struct HeadlessFrameBuffer {
    shared: Rc<SharedState>,
    name: String,
    depth_attachment: Option<Attachment>,
    color_attachments: Vec<Attachment>,
    cube_faces: Vec<CubeMapFace>,
}

/// Performs the same completeness checks a driver does and reports the status the OpenGL
/// backend would report.
fn completeness_status(
    depth_attachment: Option<&Attachment>,
    color_attachments: &[Attachment],
) -> Result<(), u32> {
    if depth_attachment.is_none() && color_attachments.is_empty() {
        return Err(MISSING_ATTACHMENT);
    }

    let mut size = None;
    for attachment in depth_attachment.into_iter().chain(color_attachments) {
        let texture = attachment.texture.borrow();
        let is_depth_attachment = attachment.kind != AttachmentKind::Color;
        if texture.pixel_kind().is_depth() != is_depth_attachment {
            return Err(INCOMPLETE_ATTACHMENT);
        }
        if attachment.kind == AttachmentKind::DepthStencil && !texture.pixel_kind().has_stencil() {
            return Err(INCOMPLETE_ATTACHMENT);
        }

        let attachment_size = texture.kind().rectangle_size();
        match size {
            None => size = Some(attachment_size),
            Some(size) if size != attachment_size => return Err(INCOMPLETE_DIMENSIONS),
            _ => (),
        }
    }

    Ok(())
}

impl HeadlessFrameBuffer {
    pub(crate) fn new(
        shared: Rc<SharedState>,
        name: &str,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Self, FrameworkError> {
        if depth_attachment
            .as_ref()
            .is_some_and(|attachment| attachment.kind == AttachmentKind::Color)
        {
            return Err(FrameworkError::InvalidFrameBuffer);
        }

        completeness_status(depth_attachment.as_ref(), &color_attachments).map_err(|status| {
            FrameworkError::FailedToConstructFrameBuffer {
                name: name.to_owned(),
                status,
            }
        })?;

        Ok(Self {
            shared,
            name: name.to_owned(),
            depth_attachment,
            cube_faces: vec![CubeMapFace::PositiveX; color_attachments.len()],
            color_attachments,
        })
    }

    pub(crate) fn backbuffer(shared: Rc<SharedState>) -> Self {
        Self {
            shared,
            name: "BackBuffer".to_owned(),
            depth_attachment: None,
            color_attachments: Default::default(),
            cube_faces: Default::default(),
        }
    }
}

fn with_headless_texture(attachment: &Attachment, func: impl FnOnce(&mut HeadlessTexture)) {
    let mut texture = attachment.texture.borrow_mut();
    if let Some(texture) = texture.as_any_mut().downcast_mut::<HeadlessTexture>() {
        func(texture)
    }
}

impl FrameBuffer for HeadlessFrameBuffer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn color_attachments(&self) -> &[Attachment] {
        &self.color_attachments
    }

    fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.as_ref()
    }

    fn set_cubemap_face(&mut self, attachment_index: usize, face: CubeMapFace) {
        if let Some(current) = self.cube_faces.get_mut(attachment_index) {
            *current = face;
        }
    }

    fn clear(
        &mut self,
        _viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        if let Some(color) = color {
            for (attachment, face) in self.color_attachments.iter().zip(&self.cube_faces) {
                with_headless_texture(attachment, |texture| texture.fill_color(*face, color));
            }
        }

        if depth.is_some() || stencil.is_some() {
            if let Some(attachment) = self.depth_attachment.as_ref() {
                with_headless_texture(attachment, |texture| {
                    texture.fill_depth_stencil(CubeMapFace::PositiveX, depth, stencil)
                });
            }
        }
    }

    fn draw(
        &mut self,
        geometry: &dyn GeometryBuffer,
        viewport: Rect<i32>,
        program: &dyn GpuProgram,
        params: &DrawParameters,
        resources: &[ResourceBinding],
        element_range: ElementRange,
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let program = program
            .as_any()
            .downcast_ref::<HeadlessProgram>()
            .ok_or_else(|| {
                FrameworkError::Custom("Program must be a headless program".to_string())
            })?;

        let (_, count) = element_range.resolve(geometry.element_count())?;

        let mut record = DrawCallRecord {
            frame_buffer: self.name.clone(),
            program: program.name().to_owned(),
            geometry: geometry.name().to_owned(),
            viewport,
            params: params.clone(),
            element_count: count,
            textures: Default::default(),
            uniforms: Default::default(),
        };

        for binding in resources {
            match binding {
                ResourceBinding::Texture {
                    texture,
                    shader_location,
                } => {
                    let sampler = program
                        .uniform_name(shader_location)
                        .map(|name| name.to_mutable())
                        .unwrap_or_default();
                    record
                        .textures
                        .push((sampler, texture.borrow().name().to_owned()));
                }
                ResourceBinding::Uniform {
                    shader_location,
                    value,
                } => {
                    let uniform = program
                        .uniform_name(shader_location)
                        .map(|name| name.to_mutable())
                        .unwrap_or_default();
                    record.uniforms.push((uniform, value.clone()));
                }
            }
        }

        let mut statistics = self.shared.statistics.get();
        statistics.program_binding_changes += 1;
        statistics.vao_binding_changes += 1;
        statistics.texture_binding_changes += record.textures.len();
        if params.blend.is_some() {
            statistics.blend_state_changes += 1;
        }
        self.shared.statistics.set(statistics);

        self.shared.draw_calls.borrow_mut().push(record);

        Ok(DrawCallStatistics { triangles: count })
    }
}
