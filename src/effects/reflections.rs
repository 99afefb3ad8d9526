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

//! Screen-space reflections: marches the reflected view ray through the G-buffer positions and
//! picks the scene color at the first hit.

use crate::{
    effects::{EffectContext, EffectTarget, ScreenSpaceEffect, REFLECTIONS_TARGET},
    forward::SCENE_COLOR_TARGET,
    gbuffer::{NORMAL_TARGET, POSITION_TARGET},
    settings::QualitySettings,
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::ImmutableString;
use umbra_graphics::{error::FrameworkError, server::GraphicsServer};

pub struct ReflectionsEffect {
    target: EffectTarget,
    inputs: [ImmutableString; 3],
}

impl ReflectionsEffect {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            target: EffectTarget::new(server, textures, REFLECTIONS_TARGET, descriptor)?,
            inputs: [
                ImmutableString::new(POSITION_TARGET),
                ImmutableString::new(NORMAL_TARGET),
                ImmutableString::new(SCENE_COLOR_TARGET),
            ],
        })
    }
}

impl ScreenSpaceEffect for ReflectionsEffect {
    fn name(&self) -> &str {
        "Reflections"
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
        settings.reflections.enabled
    }

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
        let program = ctx.shaders.get(
            ctx.server,
            &ShaderKey::full_screen(builtin::REFLECTIONS_FRAGMENT),
        )?;
        let settings = ctx.settings.reflections;

        let mut bindings = Vec::new();
        for (sampler, target) in [
            ("positionSampler", POSITION_TARGET),
            ("normalSampler", NORMAL_TARGET),
            ("colorSampler", SCENE_COLOR_TARGET),
        ] {
            program.bind_texture(&mut bindings, sampler, &ctx.textures.get(target)?);
        }
        program.bind_uniform(
            &mut bindings,
            "viewProjection",
            ctx.viewport.view_projection_matrix(),
        );
        program.bind_uniform(&mut bindings, "cameraPosition", ctx.viewport.position());
        program.bind_uniform(
            &mut bindings,
            "maxSteps",
            i32::try_from(settings.max_steps).unwrap_or(i32::MAX),
        );
        program.bind_uniform(&mut bindings, "maxDistance", settings.max_distance);

        self.target.draw_full_screen(ctx, &program, bindings)
    }
}
