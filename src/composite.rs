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

//! Final composite: combines the scene color with the outputs of the screen-space chain, tone
//! maps the result and writes it to the back buffer.

use crate::{
    context::RenderContext,
    effects::{downsample, AMBIENT_OCCLUSION_BLURRED_TARGET, BLOOM_TARGET, REFLECTIONS_TARGET},
    forward::SCENE_COLOR_TARGET,
    settings::Exposure,
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
};
use umbra_core::{
    color::Color,
    math::{make_viewport_matrix, Rect},
};
use umbra_graphics::{error::FrameworkError, DrawParameters, ElementRange};

pub const COMPOSITE_PASS_NAME: &str = "Composite";

pub struct Composite {
    average_color: String,
}

impl Composite {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            average_color: downsample::final_level_name(width, height),
        }
    }

    /// Name of the 1x1 target auto exposure reads.
    pub fn average_color_target(&self) -> &str {
        &self.average_color
    }

    pub fn render(
        &self,
        ctx: &mut RenderContext,
        viewport: Rect<i32>,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let program = ctx
            .shaders
            .get(&*ctx.server, &ShaderKey::full_screen(builtin::COMPOSITE_FRAGMENT))?;

        let mut bindings = Vec::new();
        for (sampler, target) in [
            ("sceneColor", SCENE_COLOR_TARGET),
            ("ambientOcclusion", AMBIENT_OCCLUSION_BLURRED_TARGET),
            ("bloom", BLOOM_TARGET),
            ("reflections", REFLECTIONS_TARGET),
            ("averageColor", self.average_color.as_str()),
        ] {
            program.bind_texture(&mut bindings, sampler, &ctx.textures.get(target)?);
        }

        let settings = &ctx.settings;
        program.bind_uniform(&mut bindings, "bloomStrength", settings.bloom.strength);
        match settings.tone_mapping.exposure {
            Exposure::Auto {
                key_value,
                min_luminance,
                max_luminance,
            } => {
                program.bind_uniform(&mut bindings, "autoExposure", true);
                program.bind_uniform(&mut bindings, "keyValue", key_value);
                program.bind_uniform(&mut bindings, "minLuminance", min_luminance);
                program.bind_uniform(&mut bindings, "maxLuminance", max_luminance);
                program.bind_uniform(&mut bindings, "fixedExposure", 1.0f32);
            }
            Exposure::Manual(exposure) => {
                program.bind_uniform(&mut bindings, "autoExposure", false);
                program.bind_uniform(&mut bindings, "fixedExposure", exposure);
            }
        }
        program.bind_uniform(
            &mut bindings,
            "worldViewProjection",
            make_viewport_matrix(viewport),
        );

        let mut back_buffer = ctx.server.back_buffer();
        back_buffer.clear(viewport, Some(Color::BLACK), Some(1.0), None);

        let mut statistics = RenderPassStatistics::default();
        statistics += back_buffer.draw(
            &*ctx.quad,
            viewport,
            program.gpu_program(),
            &DrawParameters::full_screen(),
            &bindings,
            ElementRange::Full,
        )?;
        Ok(statistics)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        effects::EffectChain, forward::ForwardRenderer, gbuffer::GBuffer,
        settings::QualitySettings,
    };
    use umbra_graphics::gpu_program::UniformValue;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_composite_reads_chain_outputs() {
        let server = HeadlessServer::new(4, 4);
        let mut settings = QualitySettings::high();
        settings.tone_mapping.exposure = Exposure::Manual(2.0);
        let mut ctx = RenderContext::new(server.clone(), 4, 4, settings).unwrap();
        let composite = Composite::new(4, 4);
        let viewport = Rect::new(0, 0, 4, 4);

        // Nothing to composite yet.
        assert!(matches!(
            composite.render(&mut ctx, viewport),
            Err(FrameworkError::ResourceNotFound { ref name }) if name == SCENE_COLOR_TARGET
        ));

        let gbuffer = GBuffer::new(&mut ctx, 4, 4).unwrap();
        let forward = ForwardRenderer::new(&mut ctx, 4, 4).unwrap();
        let chain = EffectChain::standard(&*ctx.server, &mut ctx.textures, 4, 4).unwrap();
        assert_eq!(composite.average_color_target(), "SceneColorDown1");

        server.take_draw_calls();
        composite.render(&mut ctx, viewport).unwrap();
        let calls = server.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frame_buffer, "BackBuffer");
        assert_eq!(calls[0].texture("averageColor"), Some("SceneColorDown1"));
        assert_eq!(calls[0].uniform("autoExposure"), Some(&UniformValue::Bool(false)));
        assert_eq!(calls[0].uniform("fixedExposure"), Some(&UniformValue::Float(2.0)));

        chain.destroy(&mut ctx.textures);
        forward.destroy(&mut ctx.textures);
        gbuffer.destroy(&mut ctx.textures);
        assert!(ctx.textures.is_empty());
    }
}
