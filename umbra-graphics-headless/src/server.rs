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
    framebuffer::HeadlessFrameBuffer, geometry_buffer::HeadlessGeometryBuffer,
    program::HeadlessProgram, texture::HeadlessTexture,
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
};
use umbra_core::{log::Log, math::Rect};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::{GpuProgram, UniformValue},
    gpu_texture::{GpuTexture, GpuTextureDescriptor},
    server::GraphicsServer,
    stats::PipelineStatistics,
    DrawParameters,
};

/// Everything a single draw call was issued with.
#[derive(Clone, Debug)]
pub struct DrawCallRecord {
    pub frame_buffer: String,
    pub program: String,
    pub geometry: String,
    pub viewport: Rect<i32>,
    pub params: DrawParameters,
    /// Amount of drawn elements (triangles for triangle meshes).
    pub element_count: usize,
    /// Pairs of (sampler name, texture name) in binding order.
    pub textures: Vec<(String, String)>,
    /// Pairs of (uniform name, value) in binding order.
    pub uniforms: Vec<(String, UniformValue)>,
}

impl DrawCallRecord {
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms
            .iter()
            .find_map(|(uniform, value)| (uniform == name).then_some(value))
    }

    pub fn texture(&self, sampler: &str) -> Option<&str> {
        self.textures
            .iter()
            .find_map(|(s, texture)| (s == sampler).then_some(texture.as_str()))
    }
}

/// State shared between the server and every object it created.
#[derive(Default)]
pub(crate) struct SharedState {
    pub(crate) live_textures: Cell<usize>,
    pub(crate) max_texture_size: Cell<Option<usize>>,
    pub(crate) draw_calls: RefCell<Vec<DrawCallRecord>>,
    pub(crate) statistics: Cell<PipelineStatistics>,
}

/// Graphics server that runs the whole pipeline on the CPU without producing an image. Clears
/// are applied to texture storage, draw calls are recorded and can be inspected afterwards.
pub struct HeadlessServer {
    shared: Rc<SharedState>,
    frame_size: Cell<(u32, u32)>,
    frames_presented: Cell<usize>,
}

impl HeadlessServer {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Log::info(format!("Headless graphics server created. Frame size: {width}x{height}"));

        Rc::new(Self {
            shared: Default::default(),
            frame_size: Cell::new((width, height)),
            frames_presented: Cell::new(0),
        })
    }

    /// Makes every texture larger than the given size fail to allocate, like a driver does when
    /// `GL_MAX_TEXTURE_SIZE` is exceeded.
    pub fn set_max_texture_size(&self, max_texture_size: Option<usize>) {
        self.shared.max_texture_size.set(max_texture_size);
    }

    /// Amount of textures that are currently alive.
    pub fn live_texture_count(&self) -> usize {
        self.shared.live_textures.get()
    }

    pub fn draw_calls(&self) -> Vec<DrawCallRecord> {
        self.shared.draw_calls.borrow().clone()
    }

    pub fn draw_call_count(&self) -> usize {
        self.shared.draw_calls.borrow().len()
    }

    /// Returns recorded draw calls and starts recording from scratch.
    pub fn take_draw_calls(&self) -> Vec<DrawCallRecord> {
        std::mem::take(&mut *self.shared.draw_calls.borrow_mut())
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented.get()
    }
}

impl GraphicsServer for HeadlessServer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        Ok(Rc::new(RefCell::new(HeadlessTexture::new(
            self.shared.clone(),
            desc,
        )?)))
    }

    fn create_frame_buffer(
        &self,
        name: &str,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError> {
        Ok(Box::new(HeadlessFrameBuffer::new(
            self.shared.clone(),
            name,
            depth_attachment,
            color_attachments,
        )?))
    }

    fn back_buffer(&self) -> Box<dyn FrameBuffer> {
        Box::new(HeadlessFrameBuffer::backbuffer(self.shared.clone()))
    }

    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError> {
        Ok(Box::new(HeadlessProgram::from_source(
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
        Ok(Box::new(HeadlessProgram::from_source(
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
        Ok(Box::new(HeadlessGeometryBuffer::new(desc)?))
    }

    fn swap_buffers(&self) -> Result<(), FrameworkError> {
        self.frames_presented.set(self.frames_presented.get() + 1);
        self.shared.statistics.set(Default::default());
        Ok(())
    }

    fn set_frame_size(&self, new_size: (u32, u32)) {
        self.frame_size.set(new_size);
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size.get()
    }

    fn pipeline_statistics(&self) -> PipelineStatistics {
        self.shared.statistics.get()
    }
}
