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
    effects::{EffectContext, EffectTarget, ScreenSpaceEffect, BLOOM_BRIGHT_TARGET},
    forward::SCENE_COLOR_TARGET,
    settings::QualitySettings,
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::ImmutableString;
use umbra_graphics::{error::FrameworkError, server::GraphicsServer};

/// Bright pass of bloom: keeps pixels of the scene whose luminance exceeds the threshold. The
/// result is blurred by two [`super::blur::BlurEffect`]s.
pub struct BloomEffect {
    target: EffectTarget,
    inputs: [ImmutableString; 1],
}

impl BloomEffect {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            target: EffectTarget::new(server, textures, BLOOM_BRIGHT_TARGET, descriptor)?,
            inputs: [ImmutableString::new(SCENE_COLOR_TARGET)],
        })
    }
}

impl ScreenSpaceEffect for BloomEffect {
    fn name(&self) -> &str {
        "Bloom"
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

    fn is_enabled(&self, settings: &QualitySettings) -> bool {
        settings.bloom.enabled
    }

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
        let program = ctx
            .shaders
            .get(ctx.server, &ShaderKey::full_screen(builtin::BLOOM_FRAGMENT))?;

        let mut bindings = Vec::new();
        program.bind_texture(
            &mut bindings,
            "hdrSampler",
            &ctx.textures.get(SCENE_COLOR_TARGET)?,
        );
        program.bind_uniform(&mut bindings, "threshold", ctx.settings.bloom.threshold);

        self.target.draw_full_screen(ctx, &program, bindings)
    }
}
