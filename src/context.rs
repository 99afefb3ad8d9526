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

//! Everything the passes of a frame share.

use crate::{
    effects::EffectContext,
    light::{AddLightResult, Light, LightHandle, LightManager},
    material::FallbackTextures,
    mesh::{cache::GeometryCache, surface::SurfaceData, MeshManager},
    scheduler::RenderScheduler,
    settings::QualitySettings,
    shader::ShaderLibrary,
    texture_registry::TextureRegistry,
    viewport::Viewport,
};
use std::sync::Arc;
use umbra_core::algebra::Vector2;
use umbra_graphics::{
    error::FrameworkError, geometry_buffer::GeometryBuffer, server::SharedGraphicsServer,
};

/// Render state owned by the render thread. Other threads reach it only through
/// [`RenderContext::scheduler`], meshes are the exception as they live in a thread safe
/// [`MeshManager`].
pub struct RenderContext {
    pub server: SharedGraphicsServer,
    pub textures: TextureRegistry,
    pub shaders: ShaderLibrary,
    pub geometry_cache: GeometryCache,
    pub fallbacks: FallbackTextures,
    /// Unit quad every screen-space pass draws.
    pub quad: Box<dyn GeometryBuffer>,
    pub lights: LightManager,
    pub viewport: Viewport,
    pub settings: QualitySettings,
    pub meshes: Arc<MeshManager>,
    pub scheduler: Arc<RenderScheduler<RenderContext>>,
}

impl RenderContext {
    pub fn new(
        server: SharedGraphicsServer,
        width: usize,
        height: usize,
        settings: QualitySettings,
    ) -> Result<Self, FrameworkError> {
        let fallbacks = FallbackTextures::new(&*server)?;
        let quad = SurfaceData::make_unit_xy_quad().upload(&*server, "FullScreenQuad")?;

        Ok(Self {
            textures: TextureRegistry::new(),
            shaders: ShaderLibrary::default(),
            geometry_cache: GeometryCache::default(),
            fallbacks,
            quad,
            lights: LightManager::new(),
            viewport: Viewport::new(Vector2::new(width as f32, height as f32)),
            settings,
            meshes: Arc::new(MeshManager::new()),
            scheduler: Arc::new(RenderScheduler::new()),
            server,
        })
    }

    /// Adds a light using the current shadow settings, see [`LightManager::add_light`].
    pub fn add_light(&mut self, light: impl Into<Light>) -> Result<AddLightResult, FrameworkError> {
        self.lights
            .add_light(light.into(), &*self.server, &self.settings.shadows)
    }

    pub fn remove_light(&mut self, handle: LightHandle) -> bool {
        self.lights.remove_light(handle)
    }

    pub fn effect_context(&mut self) -> EffectContext<'_> {
        EffectContext {
            server: &*self.server,
            textures: &self.textures,
            shaders: &mut self.shaders,
            quad: &*self.quad,
            viewport: &self.viewport,
            settings: &self.settings,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::light::{PointLight, SunLight};
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_scheduled_actions_reach_context() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server, 8, 8, QualitySettings::low()).unwrap();
        let scheduler = ctx.scheduler.clone();

        let worker = std::thread::spawn({
            let scheduler = scheduler.clone();
            move || {
                scheduler.schedule(|ctx: &mut RenderContext| {
                    ctx.settings.bloom.enabled = true;
                });
            }
        });
        worker.join().unwrap();

        assert_eq!(scheduler.run(&mut ctx), 1);
        assert!(ctx.settings.bloom.enabled);
    }

    #[test]
    fn test_add_light_uses_shadow_settings() {
        let server = HeadlessServer::new(8, 8);
        let mut settings = QualitySettings::low();
        settings.shadows.sun_map_size = 32;
        let mut ctx = RenderContext::new(server, 8, 8, settings).unwrap();

        let AddLightResult::Added(sun) = ctx.add_light(SunLight::default()).unwrap() else {
            panic!("sun must be added");
        };
        assert_eq!(ctx.lights.shadow_resources(sun).unwrap().size(), 32);
        assert!(matches!(
            ctx.add_light(PointLight::default()).unwrap(),
            AddLightResult::Added(_)
        ));
        assert!(ctx.remove_light(sun));
        assert_eq!(ctx.lights.len(), 1);
    }
}
