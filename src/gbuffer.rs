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

//! Deferred geometry pass. Opaque meshes write their position, albedo, normal and texture
//! coordinates into named targets that screen-space effects read later in the frame.

use crate::{
    context::RenderContext,
    mesh::{MeshDrawContext, MeshFilter},
    shader::{PassBindings, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::{color::Color, math::Rect};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::PixelKind,
    DrawParameters,
};

pub const GBUFFER_PASS_NAME: &str = "GBuffer";

pub const POSITION_TARGET: &str = "GBufferPosition";
pub const ALBEDO_TARGET: &str = "GBufferAlbedo";
pub const NORMAL_TARGET: &str = "GBufferNormal";
pub const TEX_COORD_TARGET: &str = "GBufferTexCoord";
/// Depth-stencil target shared with the forward pass.
pub const SCENE_DEPTH_TARGET: &str = "SceneDepth";

const COLOR_TARGETS: [(&str, PixelKind); 4] = [
    (POSITION_TARGET, PixelKind::RGBA16F),
    (ALBEDO_TARGET, PixelKind::RGBA8),
    (NORMAL_TARGET, PixelKind::RGBA16F),
    (TEX_COORD_TARGET, PixelKind::RG16F),
];

pub struct GBuffer {
    frame_buffer: Box<dyn FrameBuffer>,
    width: usize,
    height: usize,
}

impl GBuffer {
    pub fn new(ctx: &mut RenderContext, width: usize, height: usize) -> Result<Self, FrameworkError> {
        let mut targets = vec![(
            SCENE_DEPTH_TARGET,
            RenderTargetDescriptor::rectangle(PixelKind::D24S8, width, height),
        )];
        targets.extend(COLOR_TARGETS.iter().map(|(name, pixel_kind)| {
            (*name, RenderTargetDescriptor::rectangle(*pixel_kind, width, height))
        }));

        let mut textures = ctx.textures.acquire_all(&*ctx.server, &targets)?.into_iter();
        let depth = textures
            .next()
            .ok_or_else(|| FrameworkError::resource_not_found(SCENE_DEPTH_TARGET))?;

        match ctx.server.create_frame_buffer(
            GBUFFER_PASS_NAME,
            Some(Attachment::depth_stencil(depth)),
            textures.map(Attachment::color).collect(),
        ) {
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

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frame_buffer(&self) -> &dyn FrameBuffer {
        &*self.frame_buffer
    }

    /// Releases every target of the G-buffer.
    pub fn destroy(self, textures: &mut TextureRegistry) {
        textures.release_all(
            std::iter::once(SCENE_DEPTH_TARGET).chain(COLOR_TARGETS.iter().map(|(name, _)| *name)),
        );
    }

    /// Clears the targets and draws every visible opaque mesh into them.
    pub fn geometry_pass(
        &mut self,
        ctx: &mut RenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let viewport = Rect::new(0, 0, self.width as i32, self.height as i32);
        // Zero alpha marks pixels no geometry was written to.
        self.frame_buffer
            .clear(viewport, Some(Color::TRANSPARENT), Some(1.0), Some(0));

        let program = ctx.shaders.get(&*ctx.server, &ShaderKey::gbuffer())?;
        let meshes = ctx.meshes.clone();
        let pass = PassBindings::default();
        meshes.draw_gbuffer(&mut MeshDrawContext {
            pass_name: GBUFFER_PASS_NAME,
            server: &*ctx.server,
            frame_buffer: &mut *self.frame_buffer,
            viewport,
            frustum: ctx.viewport.frustum(),
            view_projection: ctx.viewport.view_projection_matrix(),
            observer_position: ctx.viewport.position(),
            params: DrawParameters::default(),
            filter: MeshFilter::OpaqueOnly,
            include_dev_only: false,
            shader_override: Some(program),
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
    use crate::{material::Material, mesh::surface::SurfaceData, settings::QualitySettings};
    use umbra_core::algebra::{Matrix4, Vector3};
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_targets_are_registered() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server.clone(), 8, 8, QualitySettings::low()).unwrap();
        let gbuffer = GBuffer::new(&mut ctx, 8, 8).unwrap();

        for name in [
            POSITION_TARGET,
            ALBEDO_TARGET,
            NORMAL_TARGET,
            TEX_COORD_TARGET,
            SCENE_DEPTH_TARGET,
        ] {
            assert_eq!(ctx.textures.ref_count(name), Some(1), "{name}");
        }
        assert_eq!(gbuffer.frame_buffer().color_attachments().len(), 4);

        gbuffer.destroy(&mut ctx.textures);
        assert!(ctx.textures.is_empty());
    }

    #[test]
    fn test_allocation_failure_releases_targets() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server.clone(), 8, 8, QualitySettings::low()).unwrap();
        server.set_max_texture_size(Some(16));

        assert!(matches!(
            GBuffer::new(&mut ctx, 32, 32),
            Err(FrameworkError::TextureAllocationFailed { ref name, .. }) if name == SCENE_DEPTH_TARGET
        ));
        assert!(ctx.textures.is_empty());
    }

    #[test]
    fn test_geometry_pass_draws_opaque_meshes() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server.clone(), 8, 8, QualitySettings::low()).unwrap();
        let mut gbuffer = GBuffer::new(&mut ctx, 8, 8).unwrap();

        let cube = SurfaceData::make_cube(Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0)));
        ctx.meshes.add_mesh(cube.clone(), Material::standard());
        let mut glass = Material::standard();
        glass.set_property("AlphaTest", true);
        ctx.meshes.add_mesh(cube, glass);

        server.take_draw_calls();
        let statistics = gbuffer.geometry_pass(&mut ctx).unwrap();
        let calls = server.take_draw_calls();
        assert_eq!(statistics.draw_calls, 1);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frame_buffer, GBUFFER_PASS_NAME);
        assert_eq!(calls[0].texture("uDiffuse"), Some("WhiteFallback"));
    }
}
