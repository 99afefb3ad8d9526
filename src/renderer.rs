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

//! Frame orchestration. The renderer owns the frame-sized targets of every pass and runs the
//! passes in a fixed order:
//!
//! 1. Actions scheduled by other threads.
//! 2. Geometry pass into the G-buffer.
//! 3. Shadow maps of every light.
//! 4. Forward pass into the scene color.
//! 5. Mesh updates that were queued while the meshes were in flight.
//! 6. Screen-space effect chain.
//! 7. Composite into the back buffer, then the buffers are swapped.
//!
//! A resize does not happen immediately, the next frame recreates the targets and skips
//! drawing.

use crate::{
    composite::{Composite, COMPOSITE_PASS_NAME},
    context::RenderContext,
    effects::EffectChain,
    forward::{ForwardRenderer, FORWARD_PASS_NAME},
    gbuffer::{GBuffer, GBUFFER_PASS_NAME},
    light::shadow::ShadowRenderContext,
    mesh::MeshManager,
    scheduler::RenderScheduler,
    settings::QualitySettings,
    stats::FrameStatistics,
    texture_registry::TextureRegistry,
};
use std::sync::Arc;
use umbra_core::{algebra::Vector2, err, info, math::Rect};
use umbra_graphics::{error::FrameworkError, server::SharedGraphicsServer};

/// Everything that depends on the frame size.
struct FrameTargets {
    gbuffer: GBuffer,
    forward: ForwardRenderer,
    effects: EffectChain,
    composite: Composite,
}

impl FrameTargets {
    fn new(ctx: &mut RenderContext, width: usize, height: usize) -> Result<Self, FrameworkError> {
        let gbuffer = GBuffer::new(ctx, width, height)?;
        let forward = match ForwardRenderer::new(ctx, width, height) {
            Ok(forward) => forward,
            Err(error) => {
                gbuffer.destroy(&mut ctx.textures);
                return Err(error);
            }
        };
        let effects = match EffectChain::standard(&*ctx.server, &mut ctx.textures, width, height)
        {
            Ok(effects) => effects,
            Err(error) => {
                forward.destroy(&mut ctx.textures);
                gbuffer.destroy(&mut ctx.textures);
                return Err(error);
            }
        };

        Ok(Self {
            gbuffer,
            forward,
            effects,
            composite: Composite::new(width, height),
        })
    }

    fn destroy(self, textures: &mut TextureRegistry) {
        self.effects.destroy(textures);
        self.forward.destroy(textures);
        self.gbuffer.destroy(textures);
    }
}

pub struct Renderer {
    context: RenderContext,
    targets: Option<FrameTargets>,
    frame_size: (usize, usize),
    need_to_recreate_buffers: bool,
    statistics: FrameStatistics,
}

impl Renderer {
    pub fn new(
        server: SharedGraphicsServer,
        width: usize,
        height: usize,
        settings: QualitySettings,
    ) -> Result<Self, FrameworkError> {
        let frame_size = (width.max(1), height.max(1));
        let mut context = RenderContext::new(server, frame_size.0, frame_size.1, settings)?;
        let targets = FrameTargets::new(&mut context, frame_size.0, frame_size.1)?;

        info!(
            "Renderer created. Frame size: {}x{}",
            frame_size.0, frame_size.1
        );

        Ok(Self {
            context,
            targets: Some(targets),
            frame_size,
            need_to_recreate_buffers: false,
            statistics: Default::default(),
        })
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Mesh storage, can be shared with any thread.
    pub fn meshes(&self) -> &Arc<MeshManager> {
        &self.context.meshes
    }

    /// Queue of actions that run on the render thread at the start of the next frame.
    pub fn scheduler(&self) -> &Arc<RenderScheduler<RenderContext>> {
        &self.context.scheduler
    }

    /// New settings take effect on the next frame. Shadow maps of existing lights are resized
    /// the next time their shadows are drawn.
    pub fn set_quality_settings(&mut self, settings: &QualitySettings) {
        self.context.settings = *settings;
    }

    pub fn quality_settings(&self) -> QualitySettings {
        self.context.settings
    }

    pub fn frame_size(&self) -> (usize, usize) {
        self.frame_size
    }

    /// Statistics of the last rendered frame.
    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    /// Requests new frame-sized targets. They are created at the start of the next frame and
    /// that frame draws nothing.
    pub fn set_frame_size(&mut self, width: usize, height: usize) {
        let new_size = (width.max(1), height.max(1));
        if new_size == self.frame_size && self.targets.is_some() {
            return;
        }
        self.frame_size = new_size;
        self.need_to_recreate_buffers = true;
        self.context
            .server
            .set_frame_size((new_size.0 as u32, new_size.1 as u32));
    }

    pub fn is_recreation_pending(&self) -> bool {
        self.need_to_recreate_buffers
    }

    /// Drops cached programs and geometry, they are rebuilt on demand.
    pub fn flush(&mut self) {
        self.context.shaders.clear();
        self.context.geometry_cache.clear();
    }

    fn recreate_buffers(&mut self) -> Result<(), FrameworkError> {
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.context.textures);
        }

        let (width, height) = self.frame_size;
        self.context
            .viewport
            .set_frame_size(Vector2::new(width as f32, height as f32));
        self.targets = Some(FrameTargets::new(&mut self.context, width, height)?);
        self.need_to_recreate_buffers = false;

        info!("Render targets were recreated. New frame size: {width}x{height}");

        Ok(())
    }

    /// Renders a frame and presents it. Failures of a single pass are logged and the frame
    /// continues, only failures to create targets or to present are returned.
    pub fn render_frame(&mut self) -> Result<FrameStatistics, FrameworkError> {
        let mut statistics = FrameStatistics::default();

        self.context.viewport.think();

        let scheduler = self.context.scheduler.clone();
        statistics.scheduled_actions = scheduler.run(&mut self.context);

        if self.need_to_recreate_buffers {
            self.recreate_buffers()?;
            statistics.buffers_recreated = true;
            self.statistics = statistics;
            return Ok(statistics);
        }

        let Self {
            context: ctx,
            targets,
            frame_size,
            ..
        } = self;
        let targets = targets
            .as_mut()
            .ok_or_else(|| FrameworkError::Custom("Render targets are missing".to_string()))?;

        match targets.gbuffer.geometry_pass(ctx) {
            Ok(pass) => statistics.gbuffer = statistics.add_pass(pass),
            Err(error) => err!("{GBUFFER_PASS_NAME}: geometry pass failed. Reason: {error}"),
        }

        let (shadows, lighting) = ctx.lights.draw_shadows(
            &mut ShadowRenderContext {
                server: &*ctx.server,
                meshes: &ctx.meshes,
                shaders: &mut ctx.shaders,
                geometry_cache: &mut ctx.geometry_cache,
                textures: &ctx.textures,
                fallbacks: &ctx.fallbacks,
            },
            &ctx.viewport,
            &ctx.settings.shadows,
        );
        statistics.shadows = statistics.add_pass(shadows);
        statistics.lighting = lighting;

        match targets.forward.render(ctx) {
            Ok(pass) => statistics.forward = statistics.add_pass(pass),
            Err(error) => err!("{FORWARD_PASS_NAME}: forward pass failed. Reason: {error}"),
        }

        // Meshes are no longer in flight.
        statistics.mesh_updates = ctx.meshes.apply_pending_updates();
        ctx.geometry_cache.retain_alive(&ctx.meshes);

        let post_processing = targets.effects.run(&mut ctx.effect_context());
        statistics.post_processing = statistics.add_pass(post_processing);

        let window_viewport = Rect::new(0, 0, frame_size.0 as i32, frame_size.1 as i32);
        match targets.composite.render(ctx, window_viewport) {
            Ok(pass) => {
                let pass = statistics.add_pass(pass);
                statistics.post_processing += pass;
            }
            Err(error) => err!("{COMPOSITE_PASS_NAME}: unable to present frame. Reason: {error}"),
        }

        statistics.pipeline = ctx.server.pipeline_statistics();
        ctx.server.swap_buffers()?;

        self.statistics = statistics;
        Ok(statistics)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        effects::{AMBIENT_OCCLUSION_BLURRED_TARGET, AMBIENT_OCCLUSION_TARGET},
        forward::SCENE_COLOR_TARGET,
        light::{AddLightResult, PointLight},
        material::Material,
        mesh::surface::SurfaceData,
    };
    use umbra_core::algebra::{Matrix4, Vector3};
    use umbra_graphics::server::GraphicsServer;
    use umbra_graphics_headless::HeadlessServer;

    fn low_settings() -> QualitySettings {
        let mut settings = QualitySettings::low();
        settings.shadows.sun_map_size = 16;
        settings.shadows.light_map_size = 16;
        settings
    }

    fn cube_at(z: f32) -> SurfaceData {
        SurfaceData::make_cube(Matrix4::new_translation(&Vector3::new(0.0, 0.0, z)))
    }

    #[test]
    fn test_culled_mesh_is_not_drawn() {
        let server = HeadlessServer::new(8, 8);
        let mut renderer = Renderer::new(server.clone(), 8, 8, low_settings()).unwrap();
        renderer.meshes().add_mesh(cube_at(-5.0), Material::standard());
        renderer.meshes().add_mesh(cube_at(-5000.0), Material::standard());

        server.take_draw_calls();
        let statistics = renderer.render_frame().unwrap();
        let calls = server.take_draw_calls();

        let forward = calls
            .iter()
            .filter(|call| call.frame_buffer == FORWARD_PASS_NAME)
            .count();
        assert_eq!(forward, 1);
        assert_eq!(statistics.forward.draw_calls, 1);
        assert_eq!(statistics.gbuffer.draw_calls, 1);
        assert_eq!(
            calls
                .iter()
                .filter(|call| call.frame_buffer == "BackBuffer")
                .count(),
            1
        );
        assert_eq!(server.frames_presented(), 1);
    }

    #[test]
    fn test_disabled_ambient_occlusion_is_neutral() {
        let server = HeadlessServer::new(8, 8);
        let mut settings = low_settings();
        settings.ambient_occlusion.enabled = true;
        let mut renderer = Renderer::new(server.clone(), 8, 8, settings).unwrap();
        renderer.meshes().add_mesh(cube_at(-5.0), Material::standard());

        let read = |renderer: &Renderer, name: &str| {
            renderer
                .context()
                .textures
                .get(name)
                .unwrap()
                .borrow()
                .read_pixels()
        };

        // Enabled occlusion leaves whatever the shader wrote, not white.
        renderer.render_frame().unwrap();
        for name in [AMBIENT_OCCLUSION_TARGET, AMBIENT_OCCLUSION_BLURRED_TARGET] {
            let pixels = read(&renderer, name);
            assert!(!pixels.is_empty());
            assert!(pixels.iter().any(|&byte| byte != 255), "{name} is already white");
        }

        settings.ambient_occlusion.enabled = false;
        renderer.set_quality_settings(&settings);
        renderer.render_frame().unwrap();

        for name in [AMBIENT_OCCLUSION_TARGET, AMBIENT_OCCLUSION_BLURRED_TARGET] {
            let pixels = read(&renderer, name);
            assert!(pixels.iter().all(|&byte| byte == 255), "{name} is not white");
        }
    }

    #[test]
    fn test_resize_recreates_targets_and_skips_frame() {
        let server = HeadlessServer::new(8, 8);
        let mut renderer = Renderer::new(server.clone(), 8, 8, low_settings()).unwrap();
        renderer.meshes().add_mesh(cube_at(-5.0), Material::standard());

        renderer.set_frame_size(16, 4);
        assert!(renderer.is_recreation_pending());
        assert_eq!(server.frame_size(), (16, 4));

        server.take_draw_calls();
        let statistics = renderer.render_frame().unwrap();
        assert!(statistics.buffers_recreated);
        assert_eq!(server.draw_call_count(), 0);
        assert_eq!(server.frames_presented(), 0);

        let scene_color = renderer.context().textures.get(SCENE_COLOR_TARGET).unwrap();
        assert_eq!(scene_color.borrow().kind().rectangle_size(), (16, 4));
        assert_eq!(renderer.context().viewport.frame_size(), Vector2::new(16.0, 4.0));

        let statistics = renderer.render_frame().unwrap();
        assert!(!statistics.buffers_recreated);
        assert_eq!(statistics.forward.draw_calls, 1);
        assert_eq!(server.frames_presented(), 1);
    }

    #[test]
    fn test_scheduled_light_is_drawn_in_same_frame() {
        let server = HeadlessServer::new(8, 8);
        let mut renderer = Renderer::new(server.clone(), 8, 8, low_settings()).unwrap();
        renderer.meshes().add_mesh(cube_at(-5.0), Material::standard());

        let scheduler = renderer.scheduler().clone();
        std::thread::spawn(move || {
            scheduler.schedule(|ctx: &mut RenderContext| {
                let result = ctx.add_light(PointLight::default()).unwrap();
                assert!(matches!(result, AddLightResult::Added(_)));
            });
        })
        .join()
        .unwrap();

        let statistics = renderer.render_frame().unwrap();
        assert_eq!(statistics.scheduled_actions, 1);
        assert_eq!(statistics.lighting.point_lights_rendered, 1);
        assert_eq!(renderer.context().lights.len(), 1);
    }

    #[test]
    fn test_no_textures_outlive_renderer() {
        let server = HeadlessServer::new(4, 4);
        let renderer = Renderer::new(server.clone(), 4, 4, low_settings()).unwrap();
        assert!(renderer.context().textures.get(SCENE_COLOR_TARGET).is_ok());
        assert!(server.live_texture_count() > 0);
        drop(renderer);
        assert_eq!(server.live_texture_count(), 0);
    }
}
