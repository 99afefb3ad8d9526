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

//! Headless implementation of [`umbra_graphics::server::GraphicsServer`]. Nothing is rasterized:
//! clears are applied to CPU-side texture storage and every draw call is recorded together with
//! its pipeline state and resource bindings. The renderer runs unchanged on top of it, which is
//! what the rendering tests rely on.

pub use umbra_core as core;
pub use umbra_graphics as graphics;

pub mod framebuffer;
pub mod geometry_buffer;
pub mod program;
pub mod server;
pub mod texture;

pub use server::{DrawCallRecord, HeadlessServer};

#[cfg(test)]
mod test {
    use crate::{
        framebuffer::{INCOMPLETE_ATTACHMENT, INCOMPLETE_DIMENSIONS},
        texture::ALLOCATION_FAILED_STATUS,
        HeadlessServer,
    };
    use half::f16;
    use umbra_core::{color::Color, math::Rect, ImmutableString};
    use umbra_graphics::{
        error::FrameworkError,
        framebuffer::{Attachment, ResourceBinding},
        geometry_buffer::{
            AttributeDefinition, AttributeKind, BufferUsage, ElementsDescriptor,
            GeometryBufferDescriptor, TriangleDefinition, VertexBufferDescriptor,
        },
        gpu_program::UniformValue,
        gpu_texture::PixelKind,
        server::GraphicsServer,
        DrawParameters, ElementRange,
    };

    const VS: &str = "uniform mat4 worldViewProjection;\nvoid main() {}";
    const FS: &str = "uniform sampler2D diffuseTexture;\nvoid main() {}";

    #[test]
    fn test_clear_writes_texture_storage() {
        let server = HeadlessServer::new(4, 4);
        let ao = server
            .create_2d_render_target("AO", PixelKind::R8, 4, 4)
            .unwrap();
        let hdr = server
            .create_2d_render_target("HDR", PixelKind::RGBA16F, 4, 4)
            .unwrap();
        let depth = server
            .create_2d_render_target("Depth", PixelKind::D24S8, 4, 4)
            .unwrap();

        let mut frame_buffer = server
            .create_frame_buffer(
                "Test",
                Some(Attachment::depth_stencil(depth.clone())),
                vec![Attachment::color(ao.clone()), Attachment::color(hdr.clone())],
            )
            .unwrap();

        frame_buffer.clear(
            Rect::new(0, 0, 4, 4),
            Some(Color::WHITE),
            Some(1.0),
            Some(0),
        );

        assert!(ao.borrow().read_pixels().iter().all(|p| *p == 255));
        let one = f16::from_f32(1.0).to_le_bytes();
        assert!(hdr
            .borrow()
            .read_pixels()
            .chunks_exact(2)
            .all(|c| c == one));
        let depth_values = depth.borrow().read_pixels_of_type::<u32>();
        assert!(depth_values.iter().all(|d| *d == 0x00FF_FFFF << 8));
    }

    #[test]
    fn test_live_texture_count() {
        let server = HeadlessServer::new(1, 1);
        let a = server
            .create_2d_render_target("A", PixelKind::RGBA8, 2, 2)
            .unwrap();
        let b = server
            .create_2d_render_target("B", PixelKind::RGBA8, 2, 2)
            .unwrap();
        assert_eq!(server.live_texture_count(), 2);
        drop(a);
        assert_eq!(server.live_texture_count(), 1);
        drop(b);
        assert_eq!(server.live_texture_count(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let server = HeadlessServer::new(1, 1);
        server.set_max_texture_size(Some(1024));

        match server.create_2d_render_target("Huge", PixelKind::RGBA8, 4096, 4096) {
            Err(FrameworkError::TextureAllocationFailed { name, status }) => {
                assert_eq!(name, "Huge");
                assert_eq!(status, ALLOCATION_FAILED_STATUS);
            }
            _ => panic!("allocation must fail"),
        }
        assert_eq!(server.live_texture_count(), 0);
    }

    #[test]
    fn test_incomplete_frame_buffer() {
        let server = HeadlessServer::new(1, 1);
        let a = server
            .create_2d_render_target("A", PixelKind::RGBA8, 2, 2)
            .unwrap();
        let b = server
            .create_2d_render_target("B", PixelKind::RGBA8, 4, 4)
            .unwrap();
        let depth = server
            .create_2d_render_target("Depth", PixelKind::D32F, 2, 2)
            .unwrap();

        let result =
            server.create_frame_buffer("Mismatch", None, vec![Attachment::color(a.clone()), Attachment::color(b)]);
        assert!(matches!(
            result,
            Err(FrameworkError::FailedToConstructFrameBuffer { ref name, status })
                if name == "Mismatch" && status == INCOMPLETE_DIMENSIONS
        ));

        let result = server.create_frame_buffer("DepthAsColor", None, vec![Attachment::color(depth)]);
        assert!(matches!(
            result,
            Err(FrameworkError::FailedToConstructFrameBuffer { status, .. })
                if status == INCOMPLETE_ATTACHMENT
        ));
    }

    #[test]
    fn test_draw_is_recorded() {
        let server = HeadlessServer::new(2, 2);
        let target = server
            .create_2d_render_target("Target", PixelKind::RGBA8, 2, 2)
            .unwrap();
        let diffuse = server
            .create_2d_render_target("Diffuse", PixelKind::RGBA8, 1, 1)
            .unwrap();
        let mut frame_buffer = server
            .create_frame_buffer("Scene", None, vec![Attachment::color(target)])
            .unwrap();
        let program = server.create_program("Flat", VS, FS).unwrap();

        const ATTRIBUTES: &[AttributeDefinition] =
            &[AttributeDefinition::new(0, AttributeKind::Float3)];
        let vertices = [[0.0f32; 3]; 3];
        let geometry = server
            .create_geometry_buffer(GeometryBufferDescriptor {
                name: "Triangle",
                buffers: &[VertexBufferDescriptor::new(
                    BufferUsage::StaticDraw,
                    ATTRIBUTES,
                    &vertices,
                )],
                elements: ElementsDescriptor::Triangles(&[TriangleDefinition([0, 1, 2])]),
            })
            .unwrap();

        let wvp = program
            .uniform_location(&ImmutableString::new("worldViewProjection"))
            .unwrap();
        let sampler = program
            .uniform_location(&ImmutableString::new("diffuseTexture"))
            .unwrap();

        let stats = frame_buffer
            .draw(
                &*geometry,
                Rect::new(0, 0, 2, 2),
                &*program,
                &DrawParameters::default(),
                &[
                    ResourceBinding::texture(&diffuse, &sampler),
                    ResourceBinding::uniform(&wvp, UniformValue::Float(1.0)),
                ],
                ElementRange::Full,
            )
            .unwrap();
        assert_eq!(stats.triangles, 1);

        let calls = server.draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frame_buffer, "Scene");
        assert_eq!(calls[0].program, "Flat");
        assert_eq!(calls[0].texture("diffuseTexture"), Some("Diffuse"));
        assert_eq!(
            calls[0].uniform("worldViewProjection"),
            Some(&UniformValue::Float(1.0))
        );
        assert_eq!(server.pipeline_statistics().texture_binding_changes, 1);

        server.swap_buffers().unwrap();
        assert_eq!(server.frames_presented(), 1);
        assert_eq!(server.pipeline_statistics().texture_binding_changes, 0);
        assert_eq!(server.take_draw_calls().len(), 1);
        assert_eq!(server.draw_call_count(), 0);
    }
}
