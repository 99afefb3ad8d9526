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

//! Screen-space effect chain.
//!
//! Every effect reads named targets produced earlier in the frame and writes exactly one named
//! target of its own. Effects never reference each other directly, a multi-stage effect (blur,
//! downsampling) is a sequence of effects chained through the texture registry. A disabled
//! effect clears its output to a neutral value instead of drawing, so consumers never have to
//! know whether their input was actually computed.

pub mod bloom;
pub mod blur;
pub mod downsample;
pub mod reflections;
pub mod ssao;

use crate::{
    effects::{
        bloom::BloomEffect,
        blur::{BlurDirection, BlurEffect, BlurEffectDescriptor},
        downsample::DownsampleEffect,
        reflections::ReflectionsEffect,
        ssao::SsaoEffect,
    },
    settings::QualitySettings,
    shader::{RenderProgram, ShaderLibrary},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
    viewport::Viewport,
};
use umbra_core::{
    color::Color,
    err,
    math::{make_viewport_matrix, Rect},
    ImmutableString,
};
use umbra_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer, ResourceBinding},
    geometry_buffer::GeometryBuffer,
    gpu_texture::PixelKind,
    server::GraphicsServer,
    DrawParameters, ElementRange,
};

pub const AMBIENT_OCCLUSION_TARGET: &str = "AmbientOcclusion";
pub const AMBIENT_OCCLUSION_BLUR_TARGET: &str = "AmbientOcclusionBlurH";
pub const AMBIENT_OCCLUSION_BLURRED_TARGET: &str = "AmbientOcclusionBlurred";
pub const BLOOM_BRIGHT_TARGET: &str = "BloomBright";
pub const BLOOM_BLUR_TARGET: &str = "BloomBlurH";
pub const BLOOM_TARGET: &str = "Bloom";
pub const REFLECTIONS_TARGET: &str = "Reflections";

/// What effects borrow from the render context while drawing.
pub struct EffectContext<'a> {
    pub server: &'a dyn GraphicsServer,
    pub textures: &'a TextureRegistry,
    pub shaders: &'a mut ShaderLibrary,
    pub quad: &'a dyn GeometryBuffer,
    pub viewport: &'a Viewport,
    pub settings: &'a QualitySettings,
}

/// Output of an effect: a registered render target and the frame buffer drawing into it.
pub struct EffectTarget {
    name: ImmutableString,
    frame_buffer: Box<dyn FrameBuffer>,
    width: usize,
    height: usize,
}

impl EffectTarget {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        name: &str,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Self, FrameworkError> {
        let texture = textures.acquire(server, name, descriptor)?;
        let (width, height) = descriptor.kind.rectangle_size();
        match server.create_frame_buffer(name, None, vec![Attachment::color(texture)]) {
            Ok(frame_buffer) => Ok(Self {
                name: ImmutableString::new(name),
                frame_buffer,
                width,
                height,
            }),
            Err(error) => {
                textures.release_all([name]);
                Err(error)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn viewport(&self) -> Rect<i32> {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn clear(&mut self, color: Color) {
        let viewport = self.viewport();
        self.frame_buffer.clear(viewport, Some(color), None, None);
    }

    /// Clears the target and draws a full-screen quad with depth test and depth writes off.
    pub fn draw_full_screen(
        &mut self,
        ctx: &EffectContext,
        program: &RenderProgram,
        mut bindings: Vec<ResourceBinding>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let viewport = self.viewport();
        program.bind_uniform(
            &mut bindings,
            "worldViewProjection",
            make_viewport_matrix(viewport),
        );
        self.frame_buffer
            .clear(viewport, Some(Color::TRANSPARENT), None, None);

        let mut statistics = RenderPassStatistics::default();
        statistics += self.frame_buffer.draw(
            ctx.quad,
            viewport,
            program.gpu_program(),
            &DrawParameters::full_screen(),
            &bindings,
            ElementRange::Full,
        )?;
        Ok(statistics)
    }

    pub fn release(self, textures: &mut TextureRegistry) {
        textures.release_all([self.name.as_str()]);
    }
}

pub trait ScreenSpaceEffect {
    fn name(&self) -> &str;

    /// Effects run in ascending priority, effects of equal priority keep the order they were
    /// added in.
    fn priority(&self) -> i32 {
        0
    }

    fn target(&self) -> &EffectTarget;

    fn target_mut(&mut self) -> &mut EffectTarget;

    fn output(&self) -> &str {
        self.target().name()
    }

    /// Names of the targets the effect reads.
    fn inputs(&self) -> &[ImmutableString];

    fn is_enabled(&self, _settings: &QualitySettings) -> bool {
        true
    }

    /// Neutral value written to the output when the effect is disabled.
    fn disabled_clear_color(&self) -> Color {
        Color::BLACK
    }

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError>;
}

#[derive(Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn ScreenSpaceEffect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the built-in chain: ambient occlusion with its blur, bloom with its blur,
    /// reflections and the downsample levels of the scene color.
    pub fn standard(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameworkError> {
        let mut chain = Self::new();
        match chain.add_standard_effects(server, textures, width, height) {
            Ok(()) => Ok(chain),
            Err(error) => {
                chain.destroy(textures);
                Err(error)
            }
        }
    }

    fn add_standard_effects(
        &mut self,
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        width: usize,
        height: usize,
    ) -> Result<(), FrameworkError> {
        let occlusion = RenderTargetDescriptor::rectangle(PixelKind::R8, width, height);
        let hdr = RenderTargetDescriptor::rectangle(PixelKind::RGBA16F, width, height)
            .with_linear_filtering();

        self.add(SsaoEffect::new(server, textures, width, height)?);
        self.add(BlurEffect::new(
            server,
            textures,
            BlurEffectDescriptor {
                output: AMBIENT_OCCLUSION_BLUR_TARGET,
                source: AMBIENT_OCCLUSION_TARGET,
                direction: BlurDirection::Horizontal,
                target: occlusion,
                priority: 1,
                enabled: |settings| settings.ambient_occlusion.enabled,
                disabled_clear_color: Color::WHITE,
            },
        )?);
        self.add(BlurEffect::new(
            server,
            textures,
            BlurEffectDescriptor {
                output: AMBIENT_OCCLUSION_BLURRED_TARGET,
                source: AMBIENT_OCCLUSION_BLUR_TARGET,
                direction: BlurDirection::Vertical,
                target: occlusion,
                priority: 2,
                enabled: |settings| settings.ambient_occlusion.enabled,
                disabled_clear_color: Color::WHITE,
            },
        )?);

        self.add(BloomEffect::new(server, textures, hdr)?);
        self.add(BlurEffect::new(
            server,
            textures,
            BlurEffectDescriptor {
                output: BLOOM_BLUR_TARGET,
                source: BLOOM_BRIGHT_TARGET,
                direction: BlurDirection::Horizontal,
                target: hdr,
                priority: 1,
                enabled: |settings| settings.bloom.enabled,
                disabled_clear_color: Color::BLACK,
            },
        )?);
        self.add(BlurEffect::new(
            server,
            textures,
            BlurEffectDescriptor {
                output: BLOOM_TARGET,
                source: BLOOM_BLUR_TARGET,
                direction: BlurDirection::Vertical,
                target: hdr,
                priority: 2,
                enabled: |settings| settings.bloom.enabled,
                disabled_clear_color: Color::BLACK,
            },
        )?);

        self.add(ReflectionsEffect::new(server, textures, hdr)?);

        for (level, (level_width, level_height)) in downsample::level_sizes(width, height)
            .into_iter()
            .enumerate()
        {
            self.add(DownsampleEffect::new(
                server,
                textures,
                level,
                level_width,
                level_height,
            )?);
        }

        Ok(())
    }

    /// Adds an effect keeping the chain sorted by priority.
    pub fn add<E: ScreenSpaceEffect + 'static>(&mut self, effect: E) {
        self.effects.push(Box::new(effect));
        self.effects.sort_by_key(|effect| effect.priority());
    }

    /// Removes an effect and releases its output target.
    pub fn remove(&mut self, name: &str, textures: &mut TextureRegistry) -> bool {
        let Some(index) = self.effects.iter().position(|effect| effect.name() == name) else {
            return false;
        };
        let effect = self.effects.remove(index);
        textures.release_all([effect.output()]);
        true
    }

    pub fn effects(&self) -> impl Iterator<Item = &dyn ScreenSpaceEffect> {
        self.effects.iter().map(|effect| &**effect)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Runs every effect. A failing effect is logged and skipped, the rest of the chain still
    /// runs.
    pub fn run(&mut self, ctx: &mut EffectContext) -> RenderPassStatistics {
        let mut statistics = RenderPassStatistics::default();
        for effect in self.effects.iter_mut() {
            match run_effect(&mut **effect, ctx) {
                Ok(stats) => statistics += stats,
                Err(error) => err!(
                    "{}: unable to render {}. Reason: {error}",
                    effect.name(),
                    effect.output()
                ),
            }
        }
        statistics
    }

    /// Releases the outputs of every effect.
    pub fn destroy(self, textures: &mut TextureRegistry) {
        for effect in self.effects {
            textures.release_all([effect.output()]);
        }
    }
}

fn run_effect(
    effect: &mut dyn ScreenSpaceEffect,
    ctx: &mut EffectContext,
) -> Result<RenderPassStatistics, FrameworkError> {
    for input in effect.inputs() {
        ctx.textures.get(input)?;
    }

    if effect.is_enabled(ctx.settings) {
        effect.draw(ctx)
    } else {
        let color = effect.disabled_clear_color();
        effect.target_mut().clear(color);
        Ok(RenderPassStatistics::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        context::RenderContext, forward::SCENE_COLOR_TARGET, gbuffer::POSITION_TARGET,
    };
    use std::{cell::RefCell, rc::Rc};
    use umbra_graphics_headless::HeadlessServer;

    struct RecordingEffect {
        name: &'static str,
        priority: i32,
        target: EffectTarget,
        inputs: Vec<ImmutableString>,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ScreenSpaceEffect for RecordingEffect {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn target(&self) -> &EffectTarget {
            &self.target
        }

        fn target_mut(&mut self) -> &mut EffectTarget {
            &mut self.target
        }

        fn inputs(&self) -> &[ImmutableString] {
            &self.inputs
        }

        fn draw(&mut self, _ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
            self.log.borrow_mut().push(self.name);
            Ok(RenderPassStatistics {
                draw_calls: 1,
                triangles_rendered: 2,
            })
        }
    }

    fn recording(
        ctx: &mut RenderContext,
        name: &'static str,
        priority: i32,
        inputs: &[&str],
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> RecordingEffect {
        RecordingEffect {
            name,
            priority,
            target: EffectTarget::new(
                &*ctx.server,
                &mut ctx.textures,
                name,
                RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 4, 4),
            )
            .unwrap(),
            inputs: inputs.iter().map(|name| ImmutableString::new(name)).collect(),
            log: log.clone(),
        }
    }

    #[test]
    fn test_priority_order_and_missing_input() {
        let server = HeadlessServer::new(4, 4);
        let mut ctx = RenderContext::new(server, 4, 4, QualitySettings::low()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut chain = EffectChain::new();
        chain.add(recording(&mut ctx, "Second", 1, &[], &log));
        chain.add(recording(&mut ctx, "Third", 2, &["Second"], &log));
        chain.add(recording(&mut ctx, "First", 0, &[], &log));
        chain.add(recording(&mut ctx, "AlsoSecond", 1, &[], &log));
        chain.add(recording(&mut ctx, "Orphan", 0, &["Missing"], &log));

        let statistics = chain.run(&mut ctx.effect_context());
        assert_eq!(*log.borrow(), ["First", "Second", "AlsoSecond", "Third"]);
        assert_eq!(statistics.draw_calls, 4);

        assert!(chain.remove("Orphan", &mut ctx.textures));
        assert!(!ctx.textures.contains("Orphan"));
        assert!(!chain.remove("Orphan", &mut ctx.textures));
        assert_eq!(chain.len(), 4);
        chain.destroy(&mut ctx.textures);
        assert!(ctx.textures.is_empty());
    }

    #[test]
    fn test_standard_chain() {
        let server = HeadlessServer::new(8, 4);
        let mut ctx = RenderContext::new(server.clone(), 8, 4, QualitySettings::high()).unwrap();
        let chain = EffectChain::standard(&*ctx.server, &mut ctx.textures, 8, 4).unwrap();

        let outputs = chain.effects().map(|e| e.output().to_string()).collect::<Vec<_>>();
        let position = |name: &str| outputs.iter().position(|o| o == name).unwrap();
        assert!(position(AMBIENT_OCCLUSION_TARGET) < position(AMBIENT_OCCLUSION_BLUR_TARGET));
        assert!(
            position(AMBIENT_OCCLUSION_BLUR_TARGET) < position(AMBIENT_OCCLUSION_BLURRED_TARGET)
        );
        assert!(position(BLOOM_BRIGHT_TARGET) < position(BLOOM_TARGET));
        assert!(position("SceneColorDown0") < position("SceneColorDown1"));
        assert!(position("SceneColorDown1") < position("SceneColorDown2"));
        // 8x4 -> 4x2 -> 2x1 -> 1x1
        assert_eq!(downsample::final_level_name(8, 4), "SceneColorDown2");
        assert!(!outputs.iter().any(|o| o == "SceneColorDown3"));

        // Without G-buffer and scene color the effects reading them fail, effects reading the
        // outputs of other effects still run.
        assert!(!ctx.textures.contains(POSITION_TARGET));
        assert!(!ctx.textures.contains(SCENE_COLOR_TARGET));
        let mut chain = chain;
        server.take_draw_calls();
        chain.run(&mut ctx.effect_context());
        let targets = server
            .take_draw_calls()
            .into_iter()
            .map(|call| call.frame_buffer)
            .collect::<Vec<_>>();
        assert!(!targets.iter().any(|t| t == AMBIENT_OCCLUSION_TARGET));
        assert!(!targets.iter().any(|t| t == "SceneColorDown0"));
        assert!(targets.iter().any(|t| t == AMBIENT_OCCLUSION_BLURRED_TARGET));
        assert!(targets.iter().any(|t| t == "SceneColorDown1"));

        assert!(chain.remove("Reflections", &mut ctx.textures));
        assert!(!ctx.textures.contains(REFLECTIONS_TARGET));
        chain.destroy(&mut ctx.textures);
        assert!(ctx.textures.is_empty());
    }
}
