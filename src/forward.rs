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
    context::RenderContext,
    gbuffer::SCENE_DEPTH_TARGET,
    mesh::{MeshDrawContext, MeshFilter},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::{color::Color, math::Rect};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::PixelKind,
    CompareFunc, DrawParameters,
};

pub const FORWARD_PASS_NAME: &str = "Forward";

/// Lit HDR image of the scene.
pub const SCENE_COLOR_TARGET: &str = "SceneColor";

/// Lit pass that draws every visible mesh with its own material into [`SCENE_COLOR_TARGET`],
/// testing against the depth the geometry pass left behind.
pub struct ForwardRenderer {
    frame_buffer: Box<dyn FrameBuffer>,
    width: usize,
    height: usize,
}

impl ForwardRenderer {
    pub fn new(ctx: &mut RenderContext, width: usize, height: usize) -> Result<Self, FrameworkError> {
        let targets = [
            (
                SCENE_DEPTH_TARGET,
                RenderTargetDescriptor::rectangle(PixelKind::D24S8, width, height),
            ),
            (
                SCENE_COLOR_TARGET,
                RenderTargetDescriptor::rectangle(PixelKind::RGBA16F, width, height)
                    .with_linear_filtering(),
            ),
        ];
        let mut textures = ctx.textures.acquire_all(&*ctx.server, &targets)?.into_iter();

        let frame_buffer = match (textures.next(), textures.next()) {
            (Some(depth), Some(color)) => ctx.server.create_frame_buffer(
                FORWARD_PASS_NAME,
                Some(Attachment::depth_stencil(depth)),
                vec![Attachment::color(color)],
            ),
            _ => Err(FrameworkError::resource_not_found(SCENE_COLOR_TARGET)),
        };

        match frame_buffer {
            Ok(frame_buffer) => Ok(Self {
                frame_buffer,
                width,
                height,
            }),
            Err(error) => {
                ctx.textures
                    .release_all(targets.iter().map(|(name, _)| *name));
                Err(error)
            }
        }
    }

    pub fn destroy(self, textures: &mut TextureRegistry) {
        textures.release_all([SCENE_DEPTH_TARGET, SCENE_COLOR_TARGET]);
    }

    pub fn render(&mut self, ctx: &mut RenderContext) -> Result<RenderPassStatistics, FrameworkError> {
        let viewport = Rect::new(0, 0, self.width as i32, self.height as i32);
        // Depth is kept, it comes from the geometry pass.
        self.frame_buffer
            .clear(viewport, Some(Color::BLACK), None, None);

        let mut pass = ctx.lights.bind_uniforms(&ctx.viewport, &ctx.fallbacks);
        pass.set_uniform("viewMatrix", ctx.viewport.view_matrix());

        let meshes = ctx.meshes.clone();
        meshes.draw(&mut MeshDrawContext {
            pass_name: FORWARD_PASS_NAME,
            server: &*ctx.server,
            frame_buffer: &mut *self.frame_buffer,
            viewport,
            frustum: ctx.viewport.frustum(),
            view_projection: ctx.viewport.view_projection_matrix(),
            observer_position: ctx.viewport.position(),
            params: DrawParameters {
                depth_test: Some(CompareFunc::LessOrEqual),
                ..DrawParameters::default()
            },
            filter: MeshFilter::All,
            include_dev_only: false,
            shader_override: None,
            bind_material: true,
            shaders: &mut ctx.shaders,
            geometry_cache: &mut ctx.geometry_cache,
            textures: &ctx.textures,
            fallbacks: &ctx.fallbacks,
            pass: &pass,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        gbuffer::GBuffer,
        light::PointLight,
        material::Material,
        mesh::surface::SurfaceData,
        settings::QualitySettings,
    };
    use umbra_core::algebra::{Matrix4, Vector3};
    use umbra_graphics::gpu_program::UniformValue;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_scene_depth_is_shared_with_gbuffer() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server, 8, 8, QualitySettings::low()).unwrap();
        let gbuffer = GBuffer::new(&mut ctx, 8, 8).unwrap();
        let forward = ForwardRenderer::new(&mut ctx, 8, 8).unwrap();
        assert_eq!(ctx.textures.ref_count(SCENE_DEPTH_TARGET), Some(2));

        forward.destroy(&mut ctx.textures);
        assert_eq!(ctx.textures.ref_count(SCENE_DEPTH_TARGET), Some(1));
        assert!(!ctx.textures.contains(SCENE_COLOR_TARGET));
        gbuffer.destroy(&mut ctx.textures);
        assert!(ctx.textures.is_empty());
    }

    #[test]
    fn test_forward_pass_binds_lights() {
        let server = HeadlessServer::new(8, 8);
        let mut settings = QualitySettings::low();
        settings.shadows.enabled = false;
        let mut ctx = RenderContext::new(server.clone(), 8, 8, settings).unwrap();
        let mut forward = ForwardRenderer::new(&mut ctx, 8, 8).unwrap();
        ctx.add_light(PointLight::default()).unwrap();
        ctx.meshes.add_mesh(
            SurfaceData::make_cube(Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0))),
            Material::standard(),
        );

        server.take_draw_calls();
        let statistics = forward.render(&mut ctx).unwrap();
        let calls = server.take_draw_calls();
        assert_eq!(statistics.draw_calls, 1);
        assert_eq!(calls[0].frame_buffer, FORWARD_PASS_NAME);
        assert_eq!(calls[0].uniform("lightCount"), Some(&UniformValue::Int(1)));
        assert_eq!(calls[0].params.depth_test, Some(CompareFunc::LessOrEqual));
        assert_eq!(calls[0].texture("pointShadowMap0"), Some("WhiteCubeFallback"));
    }
}
