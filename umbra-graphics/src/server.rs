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
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    geometry_buffer::{GeometryBuffer, GeometryBufferDescriptor},
    gpu_program::GpuProgram,
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter, MinificationFilter,
        PixelKind, WrapMode,
    },
    stats::PipelineStatistics,
};
use std::{any::Any, cell::RefCell, rc::Rc};

pub type SharedGraphicsServer = Rc<dyn GraphicsServer>;

/// Entry point of a graphics backend. Everything it creates is bound to the thread that owns
/// the server.
pub trait GraphicsServer: Any {
    fn as_any(&self) -> &dyn Any;

    /// Creates a new GPU texture using the given descriptor. Allocation failures are reported as
    /// [`FrameworkError::TextureAllocationFailed`] with the name of the texture.
    fn create_texture(
        &self,
        desc: GpuTextureDescriptor,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError>;

    /// Creates a new frame buffer using the given depth and color attachments. An incomplete
    /// frame buffer is reported as [`FrameworkError::FailedToConstructFrameBuffer`].
    fn create_frame_buffer(
        &self,
        name: &str,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Box<dyn FrameBuffer>, FrameworkError>;

    /// Creates a frame buffer that is "connected" to the final image that will be displayed on
    /// screen.
    fn back_buffer(&self) -> Box<dyn FrameBuffer>;

    /// Creates a new named GPU program using a pair of vertex and fragment shaders.
    fn create_program(
        &self,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError>;

    /// Same as [`Self::create_program`], with an additional geometry stage (used by layered
    /// rendering into cube maps).
    fn create_program_with_geometry(
        &self,
        name: &str,
        vertex_source: &str,
        geometry_source: &str,
        fragment_source: &str,
    ) -> Result<Box<dyn GpuProgram>, FrameworkError>;

    fn create_geometry_buffer(
        &self,
        desc: GeometryBufferDescriptor,
    ) -> Result<Box<dyn GeometryBuffer>, FrameworkError>;

    /// Presents the back buffer.
    fn swap_buffers(&self) -> Result<(), FrameworkError>;

    /// Notifies the backend that the size of the back buffer has changed.
    fn set_frame_size(&self, new_size: (u32, u32));

    fn frame_size(&self) -> (u32, u32);

    fn pipeline_statistics(&self) -> PipelineStatistics;

    /// A shortcut for [`Self::create_texture`], that creates a rectangular texture with the given
    /// size and pixel kind, suitable for rendering into.
    fn create_2d_render_target(
        &self,
        name: &str,
        pixel_kind: PixelKind,
        width: usize,
        height: usize,
    ) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
        self.create_texture(GpuTextureDescriptor {
            name,
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            min_filter: MinificationFilter::Nearest,
            mag_filter: MagnificationFilter::Nearest,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            ..Default::default()
        })
    }
}
