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

//! Screen-space ambient occlusion.

use crate::{
    effects::{EffectContext, EffectTarget, ScreenSpaceEffect, AMBIENT_OCCLUSION_TARGET},
    gbuffer::{NORMAL_TARGET, POSITION_TARGET},
    settings::{AmbientOcclusionQuality, QualitySettings},
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use std::{cell::RefCell, rc::Rc};
use umbra_core::{
    algebra::{Vector2, Vector3},
    color::Color,
    math::lerpf,
    rand::{self, Rng},
    ImmutableString,
};
use umbra_graphics::{
    error::FrameworkError,
    gpu_texture::{GpuTexture, GpuTextureDescriptor, GpuTextureKind, PixelKind, WrapMode},
    server::GraphicsServer,
};

const NOISE_SIZE: usize = 4;

/// Random sample offsets inside of the unit hemisphere oriented along +Z, denser closer to
/// the origin.
pub fn make_kernel(size: usize, rng: &mut impl Rng) -> Vec<Vector3<f32>> {
    (0..size)
        .map(|i| {
            let k = i as f32 / size as f32;
            let scale = lerpf(0.1, 1.0, k * k);
            Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..1.0),
            )
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z)
            .scale(scale * rng.gen_range(0.0..1.0))
        })
        .collect()
}

fn make_noise(
    server: &dyn GraphicsServer,
    rng: &mut impl Rng,
) -> Result<Rc<RefCell<dyn GpuTexture>>, FrameworkError> {
    const RGBA_PIXEL_SIZE: usize = 4;
    let mut pixels = [0u8; RGBA_PIXEL_SIZE * NOISE_SIZE * NOISE_SIZE];
    for pixel in pixels.chunks_exact_mut(RGBA_PIXEL_SIZE) {
        // Rotation around the normal.
        pixel[0] = rng.gen();
        pixel[1] = rng.gen();
        pixel[2] = 0;
        pixel[3] = 255;
    }
    server.create_texture(GpuTextureDescriptor {
        name: "SsaoNoise",
        kind: GpuTextureKind::Rectangle {
            width: NOISE_SIZE,
            height: NOISE_SIZE,
        },
        pixel_kind: PixelKind::RGBA8,
        s_wrap_mode: WrapMode::Repeat,
        t_wrap_mode: WrapMode::Repeat,
        data: Some(&pixels),
        ..Default::default()
    })
}

pub struct SsaoEffect {
    target: EffectTarget,
    inputs: [ImmutableString; 2],
    noise: Rc<RefCell<dyn GpuTexture>>,
    quality: AmbientOcclusionQuality,
    kernel: Vec<Vector3<f32>>,
}

impl SsaoEffect {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameworkError> {
        let mut rng = rand::thread_rng();
        let noise = make_noise(server, &mut rng)?;
        let quality = AmbientOcclusionQuality::default();

        Ok(Self {
            target: EffectTarget::new(
                server,
                textures,
                AMBIENT_OCCLUSION_TARGET,
                RenderTargetDescriptor::rectangle(PixelKind::R8, width, height),
            )?,
            inputs: [
                ImmutableString::new(POSITION_TARGET),
                ImmutableString::new(NORMAL_TARGET),
            ],
            noise,
            quality,
            kernel: make_kernel(quality.kernel_size(), &mut rng),
        })
    }

    pub fn kernel(&self) -> &[Vector3<f32>] {
        &self.kernel
    }
}

impl ScreenSpaceEffect for SsaoEffect {
    fn name(&self) -> &str {
        "Ssao"
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
        settings.ambient_occlusion.enabled
    }

    /// No occlusion.
    fn disabled_clear_color(&self) -> Color {
        Color::WHITE
    }

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
        let settings = ctx.settings.ambient_occlusion;
        if settings.quality != self.quality {
            self.quality = settings.quality;
            self.kernel = make_kernel(self.quality.kernel_size(), &mut rand::thread_rng());
        }

        let program = ctx
            .shaders
            .get(ctx.server, &ShaderKey::full_screen(builtin::SSAO_FRAGMENT))?;
        let (width, height) = self.target.size();

        let mut bindings = Vec::new();
        program.bind_texture(
            &mut bindings,
            "positionSampler",
            &ctx.textures.get(POSITION_TARGET)?,
        );
        program.bind_texture(
            &mut bindings,
            "normalSampler",
            &ctx.textures.get(NORMAL_TARGET)?,
        );
        program.bind_texture(&mut bindings, "noiseSampler", &self.noise);
        program.bind_uniform(&mut bindings, "kernel", self.kernel.clone());
        program.bind_uniform(&mut bindings, "kernelSize", self.kernel.len() as i32);
        program.bind_uniform(&mut bindings, "radius", settings.radius);
        program.bind_uniform(&mut bindings, "intensity", settings.intensity);
        program.bind_uniform(
            &mut bindings,
            "noiseScale",
            Vector2::new(
                width as f32 / NOISE_SIZE as f32,
                height as f32 / NOISE_SIZE as f32,
            ),
        );
        program.bind_uniform(&mut bindings, "viewMatrix", ctx.viewport.view_matrix());
        program.bind_uniform(
            &mut bindings,
            "projectionMatrix",
            ctx.viewport.projection_matrix(),
        );

        self.target.draw_full_screen(ctx, &program, bindings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{context::RenderContext, effects::EffectChain, gbuffer::GBuffer};
    use umbra_core::rand::{rngs::StdRng, SeedableRng};
    use umbra_graphics::gpu_program::UniformValue;
    use umbra_graphics_headless::HeadlessServer;

    #[test]
    fn test_kernel_is_inside_hemisphere() {
        let mut rng = StdRng::seed_from_u64(42);
        for quality in [
            AmbientOcclusionQuality::Low,
            AmbientOcclusionQuality::Medium,
            AmbientOcclusionQuality::High,
        ] {
            let kernel = make_kernel(quality.kernel_size(), &mut rng);
            assert_eq!(kernel.len(), quality.kernel_size());
            assert!(kernel.iter().all(|v| v.z >= 0.0 && v.norm() <= 1.0));
        }
    }

    #[test]
    fn test_kernel_follows_quality() {
        let server = HeadlessServer::new(8, 8);
        let mut ctx = RenderContext::new(server.clone(), 8, 8, QualitySettings::high()).unwrap();
        let gbuffer = GBuffer::new(&mut ctx, 8, 8).unwrap();
        let mut chain = EffectChain::new();
        chain.add(SsaoEffect::new(&*ctx.server, &mut ctx.textures, 8, 8).unwrap());

        ctx.settings.ambient_occlusion.quality = AmbientOcclusionQuality::Low;
        server.take_draw_calls();
        chain.run(&mut ctx.effect_context());

        let calls = server.take_draw_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frame_buffer, AMBIENT_OCCLUSION_TARGET);
        assert_eq!(calls[0].uniform("kernelSize"), Some(&UniformValue::Int(8)));
        assert_eq!(calls[0].texture("noiseSampler"), Some("SsaoNoise"));

        chain.destroy(&mut ctx.textures);
        gbuffer.destroy(&mut ctx.textures);
    }
}
