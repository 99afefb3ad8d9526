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

//! Separable Gaussian blur. A full blur is two effects, a horizontal one reading the source and
//! a vertical one reading the output of the first.

use crate::{
    effects::{EffectContext, EffectTarget, ScreenSpaceEffect},
    settings::QualitySettings,
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::{algebra::Vector2, color::Color, ImmutableString};
use umbra_graphics::{error::FrameworkError, server::GraphicsServer};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlurDirection {
    Horizontal,
    Vertical,
}

pub struct BlurEffectDescriptor<'a> {
    pub output: &'a str,
    pub source: &'a str,
    pub direction: BlurDirection,
    pub target: RenderTargetDescriptor,
    pub priority: i32,
    /// Enable flag of the effect being blurred.
    pub enabled: fn(&QualitySettings) -> bool,
    pub disabled_clear_color: Color,
}

pub struct BlurEffect {
    name: String,
    target: EffectTarget,
    inputs: [ImmutableString; 1],
    direction: BlurDirection,
    priority: i32,
    enabled: fn(&QualitySettings) -> bool,
    disabled_clear_color: Color,
}

impl BlurEffect {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        desc: BlurEffectDescriptor,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            name: format!("{}Blur", desc.output),
            target: EffectTarget::new(server, textures, desc.output, desc.target)?,
            inputs: [ImmutableString::new(desc.source)],
            direction: desc.direction,
            priority: desc.priority,
            enabled: desc.enabled,
            disabled_clear_color: desc.disabled_clear_color,
        })
    }

    pub fn direction(&self) -> BlurDirection {
        self.direction
    }
}

impl ScreenSpaceEffect for BlurEffect {
    fn name(&self) -> &str {
        &self.name
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

    fn is_enabled(&self, settings: &QualitySettings) -> bool {
        (self.enabled)(settings)
    }

    fn disabled_clear_color(&self) -> Color {
        self.disabled_clear_color
    }

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
        let program = ctx
            .shaders
            .get(ctx.server, &ShaderKey::full_screen(builtin::BLUR_FRAGMENT))?;
        let source = ctx.textures.get(&self.inputs[0])?;
        let (width, height) = source.borrow().kind().rectangle_size();

        let mut bindings = Vec::new();
        program.bind_texture(&mut bindings, "image", &source);
        program.bind_uniform(
            &mut bindings,
            "pixelSize",
            Vector2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32),
        );
        program.bind_uniform(
            &mut bindings,
            "horizontal",
            self.direction == BlurDirection::Horizontal,
        );

        self.target.draw_full_screen(ctx, &program, bindings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{context::RenderContext, effects::EffectChain};
    use umbra_graphics::{gpu_program::UniformValue, gpu_texture::PixelKind};
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_blur_follows_upstream_flag() {
        let server = HeadlessServer::new(4, 2);
        let mut ctx = RenderContext::new(server.clone(), 4, 2, QualitySettings::high()).unwrap();
        let descriptor = RenderTargetDescriptor::rectangle(PixelKind::RGBA8, 4, 2);
        ctx.textures
            .acquire(&*ctx.server, "Source", descriptor)
            .unwrap();

        let mut chain = EffectChain::new();
        chain.add(
            BlurEffect::new(
                &*ctx.server,
                &mut ctx.textures,
                BlurEffectDescriptor {
                    output: "SourceBlurred",
                    source: "Source",
                    direction: BlurDirection::Vertical,
                    target: descriptor,
                    priority: 0,
                    enabled: |settings| settings.bloom.enabled,
                    disabled_clear_color: Color::WHITE,
                },
            )
            .unwrap(),
        );

        server.take_draw_calls();
        chain.run(&mut ctx.effect_context());
        let calls = server.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].uniform("horizontal"), Some(&UniformValue::Bool(false)));
        assert_eq!(
            calls[0].uniform("pixelSize"),
            Some(&UniformValue::Vector2(Vector2::new(0.25, 0.5)))
        );

        ctx.settings.bloom.enabled = false;
        chain.run(&mut ctx.effect_context());
        assert_eq!(server.draw_call_count(), 0);
        let pixels = ctx
            .textures
            .get("SourceBlurred")
            .unwrap()
            .borrow()
            .read_pixels();
        assert!(pixels.iter().all(|&byte| byte == 255));
    }
}
