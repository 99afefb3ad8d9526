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
    framebuffer::GlFrameBuffer, geometry_buffer::GlGeometryBuffer, program::GlProgram,
    texture::GlTexture, ToGlConstant,
};
use glow::HasContext;
use std::{
    any::Any,
    cell::RefCell,
    ops::DerefMut,
    rc::{Rc, Weak},
};
use umbra_core::{
    color::Color,
    log::{Log, MessageKind},
    math::Rect,
};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::GpuProgram,
    gpu_texture::{GpuTexture, GpuTextureDescriptor},
    server::GraphicsServer,
    stats::PipelineStatistics,
    BlendEquation, BlendFunc, ColorMask, CompareFunc, CullFace, DrawParameters, ScissorBox,
    StencilFunc, StencilOp,
};

/// The part of the window system the server needs: presenting the back buffer and following
/// size changes of the window. Implemented by the windowing layer that owns the GL context.
pub trait PresentationSurface {
    fn swap_buffers(&self) -> Result<(), FrameworkError>;
    fn resize(&self, width: u32, height: u32);
}

#[derive(Copy, Clone)]
struct TextureBinding {
    target: u32,
    texture: Option<glow::Texture>,
}

#[derive(Copy, Clone)]
struct TextureUnit {
    bindings: [TextureBinding; 3],
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            bindings: [
                TextureBinding {
                    target: glow::TEXTURE_2D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_3D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_CUBE_MAP,
                    texture: None,
                },
            ],
        }
    }
}

#[derive(Default)]
struct TextureUnitsStorage {
    active_unit: u32,
    units: [TextureUnit; 32],
}

/// Shadow copy of the GL pipeline state, every setter only reaches the driver when the value
/// actually changes.
pub(crate) struct InnerState {
    blend: bool,

    depth_test: bool,
    depth_write: bool,
    depth_func: CompareFunc,

    color_write: ColorMask,
    stencil_test: bool,
    cull_face: CullFace,
    culling: bool,
    stencil_mask: u32,
    clear_color: Color,
    clear_stencil: i32,
    clear_depth: f32,
    scissor_test: bool,

    framebuffer: Option<glow::Framebuffer>,
    viewport: Rect<i32>,

    blend_func: BlendFunc,
    blend_equation: BlendEquation,

    program: Option<glow::Program>,
    texture_units_storage: TextureUnitsStorage,

    stencil_func: StencilFunc,
    stencil_op: StencilOp,

    vao: Option<glow::VertexArray>,

    frame_statistics: PipelineStatistics,
    frame_size: (u32, u32),
}

impl InnerState {
    fn new(frame_size: (u32, u32)) -> Self {
        Self {
            blend: false,
            depth_test: false,
            depth_write: true,
            depth_func: Default::default(),
            color_write: Default::default(),
            stencil_test: false,
            cull_face: CullFace::Back,
            culling: false,
            stencil_mask: 0xFFFF_FFFF,
            clear_color: Color::from_rgba(0, 0, 0, 0),
            clear_stencil: 0,
            clear_depth: 1.0,
            scissor_test: false,
            framebuffer: None,
            viewport: Rect::new(0, 0, 1, 1),
            blend_func: Default::default(),
            blend_equation: Default::default(),
            program: Default::default(),
            texture_units_storage: Default::default(),
            stencil_func: Default::default(),
            stencil_op: Default::default(),
            vao: Default::default(),
            frame_statistics: Default::default(),
            frame_size,
        }
    }
}

pub struct GlGraphicsServer {
    pub gl: glow::Context,
    pub(crate) state: RefCell<InnerState>,
    surface: Box<dyn PresentationSurface>,
    this: RefCell<Weak<GlGraphicsServer>>,
}

#[cfg(debug_assertions)]
fn install_debug_callback(context: &mut glow::Context) {
    if !context.supported_extensions().contains("GL_KHR_debug") {
        return;
    }

    unsafe {
        context.debug_message_callback(|source, msg_type, id, severity, message| {
            let message_kind = if severity == glow::DEBUG_SEVERITY_HIGH {
                MessageKind::Error
            } else if severity == glow::DEBUG_SEVERITY_MEDIUM
                || severity == glow::DEBUG_SEVERITY_LOW
            {
                MessageKind::Warning
            } else {
                // Notifications are too noisy.
                return;
            };

            let source = match source {
                glow::DEBUG_SOURCE_API => "Calls to the OpenGL API",
                glow::DEBUG_SOURCE_WINDOW_SYSTEM => "Calls to a window-system API",
                glow::DEBUG_SOURCE_SHADER_COMPILER => "A compiler for a shading language",
                glow::DEBUG_SOURCE_THIRD_PARTY => "An application associated with OpenGL",
                glow::DEBUG_SOURCE_APPLICATION => "Generated by the user of this application",
                _ => "Other",
            };

            let msg_type = match msg_type {
                glow::DEBUG_TYPE_ERROR => "An error, typically from the API",
                glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => {
                    "Some behavior marked deprecated has been used"
                }
                glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Something has invoked undefined behavior",
                glow::DEBUG_TYPE_PORTABILITY => {
                    "Some functionality the user relies upon is not portable"
                }
                glow::DEBUG_TYPE_PERFORMANCE => "Code has triggered possible performance issues",
                _ => "Other",
            };

            Log::writeln(
                message_kind,
                format!(
                    "OpenGL Message\n\
                    \tSource: {source}\n\
                    \tType: {msg_type}\n\
                    \tId: {id}\n\
                    \tMessage: {message}"
                ),
            );
        })
    }
}

impl GlGraphicsServer {
    /// Wraps an already created and current OpenGL 3.3 core context.
    pub fn new(
        mut context: glow::Context,
        surface: Box<dyn PresentationSurface>,
        frame_size: (u32, u32),
    ) -> Rc<Self> {
        Log::info(format!(
            "Supported GL Extensions: {:?}",
            context.supported_extensions()
        ));

        #[cfg(debug_assertions)]
        install_debug_callback(&mut context);

        unsafe {
            context.depth_func(CompareFunc::default().into_gl());
        }

        let server = Rc::new(Self {
            gl: context,
            state: RefCell::new(InnerState::new(frame_size)),
            surface,
            this: Default::default(),
        });

        *server.this.borrow_mut() = Rc::downgrade(&server);

        server
    }

    pub fn weak(&self) -> Weak<Self> {
        self.this.borrow().clone()
    }

    pub fn free_texture_unit(&self) -> Option<u32> {
        let state = self.state.borrow();
        state
            .texture_units_storage
            .units
            .iter()
            .position(|unit| {
                unit.bindings
                    .iter()
                    .all(|binding| binding.texture.is_none())
            })
            .map(|index| index as u32)
    }

    /// Clears the GL error flags, so the next [`Self::last_error`] call reports errors of the
    /// following calls only.
    pub(crate) fn drain_errors(&self) {
        unsafe { while self.gl.get_error() != glow::NO_ERROR {} }
    }

    pub(crate) fn last_error(&self) -> Option<u32> {
        let error = unsafe { self.gl.get_error() };
        (error != glow::NO_ERROR).then_some(error)
    }

    pub(crate) fn set_framebuffer(&self, framebuffer: Option<glow::Framebuffer>) {
        let mut state = self.state.borrow_mut();
        if state.framebuffer != framebuffer {
            state.framebuffer = framebuffer;

            state.frame_statistics.framebuffer_binding_changes += 1;

            unsafe {
                self.gl
                    .bind_framebuffer(glow::FRAMEBUFFER, state.framebuffer)
            }
        }
    }

    pub(crate) fn set_viewport(&self, viewport: Rect<i32>) {
        let mut state = self.state.borrow_mut();
        if state.viewport != viewport {
            state.viewport = viewport;

            unsafe {
                self.gl
                    .viewport(viewport.x(), viewport.y(), viewport.w(), viewport.h());
            }
        }
    }

    pub(crate) fn set_blend(&self, blend: bool) {
        let mut state = self.state.borrow_mut();
        if state.blend != blend {
            state.blend = blend;

            state.frame_statistics.blend_state_changes += 1;

            unsafe {
                if blend {
                    self.gl.enable(glow::BLEND);
                } else {
                    self.gl.disable(glow::BLEND);
                }
            }
        }
    }

    pub(crate) fn set_depth_test(&self, depth_test: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_test != depth_test {
            state.depth_test = depth_test;

            unsafe {
                if depth_test {
                    self.gl.enable(glow::DEPTH_TEST);
                } else {
                    self.gl.disable(glow::DEPTH_TEST);
                }
            }
        }
    }

    pub(crate) fn set_depth_write(&self, depth_write: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_write != depth_write {
            state.depth_write = depth_write;

            unsafe {
                self.gl.depth_mask(depth_write);
            }
        }
    }

    pub(crate) fn set_color_write(&self, color_write: ColorMask) {
        let mut state = self.state.borrow_mut();
        if state.color_write != color_write {
            state.color_write = color_write;

            unsafe {
                self.gl.color_mask(
                    color_write.red,
                    color_write.green,
                    color_write.blue,
                    color_write.alpha,
                );
            }
        }
    }

    pub(crate) fn set_stencil_test(&self, stencil_test: bool) {
        let mut state = self.state.borrow_mut();
        if state.stencil_test != stencil_test {
            state.stencil_test = stencil_test;

            unsafe {
                if stencil_test {
                    self.gl.enable(glow::STENCIL_TEST);
                } else {
                    self.gl.disable(glow::STENCIL_TEST);
                }
            }
        }
    }

    pub(crate) fn set_cull_face(&self, cull_face: CullFace) {
        let mut state = self.state.borrow_mut();
        if state.cull_face != cull_face {
            state.cull_face = cull_face;

            unsafe { self.gl.cull_face(cull_face.into_gl()) }
        }
    }

    pub(crate) fn set_culling(&self, culling: bool) {
        let mut state = self.state.borrow_mut();
        if state.culling != culling {
            state.culling = culling;

            unsafe {
                if culling {
                    self.gl.enable(glow::CULL_FACE);
                } else {
                    self.gl.disable(glow::CULL_FACE);
                }
            }
        }
    }

    pub(crate) fn set_stencil_mask(&self, stencil_mask: u32) {
        let mut state = self.state.borrow_mut();
        if state.stencil_mask != stencil_mask {
            state.stencil_mask = stencil_mask;

            unsafe {
                self.gl.stencil_mask(stencil_mask);
            }
        }
    }

    pub(crate) fn set_clear_color(&self, color: Color) {
        let mut state = self.state.borrow_mut();
        if state.clear_color != color {
            state.clear_color = color;

            let rgba = color.as_frgba();
            unsafe {
                self.gl.clear_color(rgba.x, rgba.y, rgba.z, rgba.w);
            }
        }
    }

    pub(crate) fn set_clear_depth(&self, depth: f32) {
        let mut state = self.state.borrow_mut();
        if (state.clear_depth - depth).abs() > f32::EPSILON {
            state.clear_depth = depth;

            unsafe {
                self.gl.clear_depth_f32(depth);
            }
        }
    }

    pub(crate) fn set_clear_stencil(&self, stencil: i32) {
        let mut state = self.state.borrow_mut();
        if state.clear_stencil != stencil {
            state.clear_stencil = stencil;

            unsafe {
                self.gl.clear_stencil(stencil);
            }
        }
    }

    pub(crate) fn set_blend_func(&self, func: BlendFunc) {
        let mut state = self.state.borrow_mut();
        if state.blend_func != func {
            state.blend_func = func;

            unsafe {
                self.gl.blend_func_separate(
                    func.sfactor.into_gl(),
                    func.dfactor.into_gl(),
                    func.alpha_sfactor.into_gl(),
                    func.alpha_dfactor.into_gl(),
                );
            }
        }
    }

    pub(crate) fn set_blend_equation(&self, equation: BlendEquation) {
        let mut state = self.state.borrow_mut();
        if state.blend_equation != equation {
            state.blend_equation = equation;

            unsafe {
                self.gl
                    .blend_equation_separate(equation.rgb.into_gl(), equation.alpha.into_gl());
            }
        }
    }

    pub(crate) fn set_depth_func(&self, depth_func: CompareFunc) {
        let mut state = self.state.borrow_mut();
        if state.depth_func != depth_func {
            state.depth_func = depth_func;

            unsafe {
                self.gl.depth_func(depth_func.into_gl());
            }
        }
    }

    pub(crate) fn set_program(&self, program: Option<glow::Program>) {
        let mut state = self.state.borrow_mut();
        if state.program != program {
            state.program = program;

            state.frame_statistics.program_binding_changes += 1;

            unsafe {
                self.gl.use_program(program);
            }
        }
    }

    pub(crate) fn set_texture(&self, unit_index: u32, target: u32, texture: Option<glow::Texture>) {
        unsafe fn bind_texture(
            gl: &glow::Context,
            target: u32,
            texture: Option<glow::Texture>,
            unit_index: u32,
            active_unit: &mut u32,
        ) {
            if *active_unit != unit_index {
                *active_unit = unit_index;
                gl.active_texture(glow::TEXTURE0 + unit_index);
            }
            gl.bind_texture(target, texture);
        }

        let mut state_guard = self.state.borrow_mut();
        let state = state_guard.deref_mut();

        let Some(unit) = state
            .texture_units_storage
            .units
            .get_mut(unit_index as usize)
        else {
            return;
        };
        let active_unit = &mut state.texture_units_storage.active_unit;
        for binding in unit.bindings.iter_mut() {
            if binding.target == target {
                if binding.texture != texture {
                    binding.texture = texture;
                    unsafe { bind_texture(&self.gl, target, texture, unit_index, active_unit) };
                    state.frame_statistics.texture_binding_changes += 1;
                }
            } else if binding.texture.is_some() {
                // A unit samples one target at a time, unbind the others.
                binding.texture = None;
                unsafe { bind_texture(&self.gl, binding.target, None, unit_index, active_unit) };
                state.frame_statistics.texture_binding_changes += 1;
            }
        }
    }

    pub(crate) fn set_stencil_func(&self, func: StencilFunc) {
        let mut state = self.state.borrow_mut();
        if state.stencil_func != func {
            state.stencil_func = func;

            unsafe {
                self.gl
                    .stencil_func(func.func.into_gl(), func.ref_value as i32, func.mask);
            }
        }
    }

    pub(crate) fn set_stencil_op(&self, op: StencilOp) {
        let mut state = self.state.borrow_mut();
        if state.stencil_op != op {
            state.stencil_op = op;
            state.stencil_mask = op.write_mask;

            unsafe {
                self.gl
                    .stencil_op(op.fail.into_gl(), op.zfail.into_gl(), op.zpass.into_gl());

                self.gl.stencil_mask(op.write_mask);
            }
        }
    }

    pub(crate) fn set_vertex_array_object(&self, vao: Option<glow::VertexArray>) {
        let mut state = self.state.borrow_mut();
        if state.vao != vao {
            state.vao = vao;

            state.frame_statistics.vao_binding_changes += 1;

            unsafe {
                self.gl.bind_vertex_array(vao);
            }
        }
    }

    pub(crate) fn count_vbo_binding_change(&self) {
        self.state.borrow_mut().frame_statistics.vbo_binding_changes += 1;
    }

    pub(crate) fn set_scissor_test(&self, scissor_test: bool) {
        let mut state = self.state.borrow_mut();
        if state.scissor_test != scissor_test {
            state.scissor_test = scissor_test;

            unsafe {
                if scissor_test {
                    self.gl.enable(glow::SCISSOR_TEST);
                } else {
                    self.gl.disable(glow::SCISSOR_TEST);
                }
            }
        }
    }

    pub(crate) fn set_scissor_box(&self, scissor_box: &ScissorBox) {
        unsafe {
            self.gl.scissor(
                scissor_box.x,
                scissor_box.y,
                scissor_box.width,
                scissor_box.height,
            );
        }
    }

    pub(crate) fn apply_draw_parameters(&self, draw_params: &DrawParameters) {
        let DrawParameters {
            cull_face,
            color_write,
            depth_write,
            stencil_test,
            depth_test,
            blend,
            stencil_op,
            scissor_box,
        } = draw_params;

        if let Some(blend_params) = blend {
            self.set_blend_func(blend_params.func);
            self.set_blend_equation(blend_params.equation);
            self.set_blend(true);
        } else {
            self.set_blend(false);
        }

        if let Some(depth_func) = depth_test {
            self.set_depth_func(*depth_func);
            self.set_depth_test(true);
        } else {
            self.set_depth_test(false);
        }
        self.set_depth_write(*depth_write);

        self.set_color_write(*color_write);

        if let Some(stencil_func) = stencil_test {
            self.set_stencil_test(true);
            self.set_stencil_func(*stencil_func);
        } else {
            self.set_stencil_test(false);
        }

        self.set_stencil_op(*stencil_op);

        if let Some(cull_face) = cull_face {
            self.set_cull_face(*cull_face);
            self.set_culling(true);
        } else {
            self.set_culling(false);
        }

        if let Some(scissor_box) = scissor_box {
            self.set_scissor_test(true);
            self.set_scissor_box(scissor_box);
        } else {
            self.set_scissor_test(false);
        }
    }
}

impl GraphicsServer for GlGraphicsServer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        Ok(Rc::new(RefCell::new(GlTexture::new(self, desc)?)))
    }

    fn create_frame_buffer(
        &self,
        name: &str,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError> {
        Ok(Box::new(GlFrameBuffer::new(
            self,
            name,
            depth_attachment,
            color_attachments,
        )?))
    }

    fn back_buffer(&self) -> Box<dyn FrameBuffer> {
        Box::new(GlFrameBuffer::backbuffer(self))
    }

    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        Ok(Box::new(GlProgram::from_source(
            self,
            name,
            vertex_source,
            None,
            fragment_source,
        )?))
    }

    fn create_program_with_geometry(
        &self,
        name: &str,
        vertex_source: &str,
        geometry_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        Ok(Box::new(GlProgram::from_source(
            self,
            name,
            vertex_source,
            Some(geometry_source),
            fragment_source,
        )?))
    }

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError> {
        Ok(Box::new(GlGeometryBuffer::new(self, desc)?))
    }

    fn swap_buffers(&self) -> Result<(), FrameworkError> {
        let result = self.surface.swap_buffers();
        self.state.borrow_mut().frame_statistics = Default::default();
        result
    }

    fn set_frame_size(&self, new_size: (u32, u32)) {
        self.state.borrow_mut().frame_size = new_size;
        self.surface.resize(new_size.0.max(1), new_size.1.max(1));
    }

    fn frame_size(&self) -> (u32, u32) {
        self.state.borrow().frame_size
    }

    fn pipeline_statistics(&self) -> PipelineStatistics {
        self.state.borrow().frame_statistics
    }
}
