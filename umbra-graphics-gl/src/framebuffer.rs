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
    geometry_buffer::GlGeometryBuffer, program::GlProgram, server::GlGraphicsServer,
    texture::GlTexture, ToGlConstant,
};
use glow::HasContext;
use std::{
    any::Any,
    rc::{Rc, Weak},
};
use umbra_core::{color::Color, math::Rect};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, AttachmentKind, FrameBuffer, ResourceBinding},
    geometry_buffer::{DrawCallStatistics, GeometryBuffer},
    gpu_program::GpuProgram,
    gpu_texture::{CubeMapFace, GpuTexture, GpuTextureKind},
    ColorMask, DrawParameters, ElementRange,
};

pub struct GlFrameBuffer {
    state: Weak<GlGraphicsServer>,
    name: String,
    fbo: Option<glow::Framebuffer>,
    depth_attachment: Option<Attachment>,
    color_attachments: Vec<Attachment>,
}

fn as_gl_texture(texture: &dyn GpuTexture) -> Result<&GlTexture, FrameworkError> {
    texture
        .as_any()
        .downcast_ref::<GlTexture>()
        .ok_or_else(|| FrameworkError::Custom("Texture must be an OpenGL texture".to_string()))
}

unsafe fn set_attachment(server: &GlGraphicsServer, gl_attachment_kind: u32, texture: &GlTexture) {
    match texture.kind() {
        GpuTextureKind::Line { .. } => {
            server.gl.framebuffer_texture(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Rectangle { .. } => {
            server.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                glow::TEXTURE_2D,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Cube { .. } => {
            server.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                glow::TEXTURE_CUBE_MAP_POSITIVE_X,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Volume { .. } => {
            server.gl.framebuffer_texture_3d(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                glow::TEXTURE_3D,
                Some(texture.id()),
                0,
                0,
            );
        }
    }
}

impl GlFrameBuffer {
    pub fn new(
        server: &GlGraphicsServer,
        name: &str,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Self, FrameworkError> {
        let invalid = || FrameworkError::InvalidFrameBuffer;

        unsafe {
            let fbo = server.gl.create_framebuffer()?;

            server.set_framebuffer(Some(fbo));

            // The frame buffer owns its id from this point, so an early return releases it.
            let result = Self {
                state: server.weak(),
                name: name.to_owned(),
                fbo: Some(fbo),
                depth_attachment,
                color_attachments,
            };

            if let Some(depth_attachment) = result.depth_attachment.as_ref() {
                let depth_attachment_kind = match depth_attachment.kind {
                    AttachmentKind::Color => return Err(invalid()),
                    AttachmentKind::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
                    AttachmentKind::Depth => glow::DEPTH_ATTACHMENT,
                };
                let guard = depth_attachment.texture.borrow();
                set_attachment(server, depth_attachment_kind, as_gl_texture(&*guard)?);
            }

            let mut color_buffers = Vec::new();
            for (i, color_attachment) in result.color_attachments.iter().enumerate() {
                if color_attachment.kind != AttachmentKind::Color {
                    return Err(invalid());
                }
                let color_attachment_kind = glow::COLOR_ATTACHMENT0 + i as u32;
                let guard = color_attachment.texture.borrow();
                set_attachment(server, color_attachment_kind, as_gl_texture(&*guard)?);
                color_buffers.push(color_attachment_kind);
            }

            if color_buffers.is_empty() {
                server.gl.draw_buffers(&[glow::NONE])
            } else {
                server.gl.draw_buffers(&color_buffers);
            }

            let status = server.gl.check_framebuffer_status(glow::FRAMEBUFFER);

            server.set_framebuffer(None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(FrameworkError::FailedToConstructFrameBuffer {
                    name: name.to_owned(),
                    status,
                });
            }

            Ok(result)
        }
    }

    pub fn backbuffer(server: &GlGraphicsServer) -> Self {
        Self {
            state: server.weak(),
            name: "BackBuffer".to_owned(),
            fbo: None,
            depth_attachment: None,
            color_attachments: Default::default(),
        }
    }

    /// None is possible only for back buffer.
    pub fn id(&self) -> Option<glow::Framebuffer> {
        self.fbo
    }

    fn server(&self) -> Result<Rc<GlGraphicsServer>, FrameworkError> {
        self.state
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("Graphics server was destroyed".to_string()))
    }
}

impl FrameBuffer for GlFrameBuffer {
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
        let Ok(server) = self.server() else {
            return;
        };
        let Some(attachment) = self.color_attachments.get(attachment_index) else {
            return;
        };
        let guard = attachment.texture.borrow();
        let Ok(texture) = as_gl_texture(&*guard) else {
            return;
        };

        server.set_framebuffer(self.fbo);

        unsafe {
            server.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0 + attachment_index as u32,
                face.into_gl(),
                Some(texture.id()),
                0,
            );
        }
    }

    fn clear(
        &mut self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        let Ok(server) = self.server() else {
            return;
        };

        server.set_scissor_test(false);
        server.set_viewport(viewport);
        server.set_framebuffer(self.id());

        unsafe {
            // Special route for default buffer.
            if self.fbo.is_none() {
                let mut mask = 0;

                if let Some(color) = color {
                    server.set_color_write(ColorMask::default());
                    server.set_clear_color(color);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
                if let Some(depth) = depth {
                    server.set_depth_write(true);
                    server.set_clear_depth(depth);
                    mask |= glow::DEPTH_BUFFER_BIT;
                }
                if let Some(stencil) = stencil {
                    server.set_stencil_mask(0xFFFF_FFFF);
                    server.set_clear_stencil(stencil);
                    mask |= glow::STENCIL_BUFFER_BIT;
                }

                server.gl.clear(mask);
                return;
            }

            if let Some(depth_stencil) = self.depth_attachment.as_ref() {
                server.set_depth_write(true);
                server.set_stencil_mask(0xFFFF_FFFF);

                match (depth_stencil.kind, depth, stencil) {
                    (AttachmentKind::DepthStencil, Some(depth), Some(stencil)) => {
                        server
                            .gl
                            .clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, stencil);
                    }
                    (AttachmentKind::DepthStencil | AttachmentKind::Depth, Some(depth), _) => {
                        server.gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[depth]);
                    }
                    (AttachmentKind::DepthStencil, None, Some(stencil)) => {
                        server.gl.clear_buffer_i32_slice(glow::STENCIL, 0, &[stencil]);
                    }
                    _ => (),
                }
            }

            if let Some(color) = color {
                server.set_color_write(ColorMask::default());

                let rgba = color.as_frgba();
                for i in 0..self.color_attachments.len() {
                    server
                        .gl
                        .clear_buffer_f32_slice(glow::COLOR, i as u32, rgba.as_slice());
                }
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
        let server = self.server()?;

        let geometry = geometry
            .as_any()
            .downcast_ref::<GlGeometryBuffer>()
            .ok_or_else(|| {
                FrameworkError::Custom("Geometry must be an OpenGL geometry buffer".to_string())
            })?;
        let program = program
            .as_any()
            .downcast_ref::<GlProgram>()
            .ok_or_else(|| FrameworkError::Custom("Program must be an OpenGL program".to_string()))?;

        server.set_framebuffer(self.id());
        server.set_viewport(viewport);
        server.apply_draw_parameters(params);
        server.set_program(Some(program.id));

        let mut texture_unit = 0u32;
        for binding in resources {
            match binding {
                ResourceBinding::Texture {
                    texture,
                    shader_location,
                } => {
                    let guard = texture.borrow();
                    let texture = as_gl_texture(&*guard)?;
                    if let Some(location) = program.gl_location(shader_location) {
                        unsafe {
                            server
                                .gl
                                .uniform_1_i32(Some(&location), texture_unit as i32)
                        };
                    }
                    texture.bind(&server, texture_unit);
                    texture_unit += 1;
                }
                ResourceBinding::Uniform {
                    shader_location,
                    value,
                } => program.set_uniform(&server, shader_location, value),
            }
        }

        geometry.draw(&server, element_range)
    }
}

impl Drop for GlFrameBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            if let Some(id) = self.fbo {
                state.set_framebuffer(None);
                unsafe {
                    state.gl.delete_framebuffer(id);
                }
            }
        }
    }
}
