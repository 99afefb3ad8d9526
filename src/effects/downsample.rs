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

//! Successive halving of the scene color down to a single pixel. The last level holds the
//! average color of the frame and drives auto exposure.

use crate::{
    effects::{EffectContext, EffectTarget, ScreenSpaceEffect},
    forward::SCENE_COLOR_TARGET,
    shader::{builtin, ShaderKey},
    stats::RenderPassStatistics,
    texture_registry::{RenderTargetDescriptor, TextureRegistry},
};
use umbra_core::{algebra::Vector2, ImmutableString};
use umbra_graphics::{error::FrameworkError, gpu_texture::PixelKind, server::GraphicsServer};

pub fn level_name(level: usize) -> String {
    format!("SceneColorDown{level}")
}

/// Sizes of every level for a frame of the given size, the last one is always 1x1.
pub fn level_sizes(width: usize, height: usize) -> Vec<(usize, usize)> {
    let mut sizes = Vec::new();
    let (mut w, mut h) = (width.max(1), height.max(1));
    loop {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        sizes.push((w, h));
        if w == 1 && h == 1 {
            return sizes;
        }
    }
}

pub fn final_level_name(width: usize, height: usize) -> String {
    level_name(level_sizes(width, height).len() - 1)
}

pub struct DownsampleEffect {
    name: String,
    level: usize,
    target: EffectTarget,
    inputs: [ImmutableString; 1],
}

impl DownsampleEffect {
    pub fn new(
        server: &dyn GraphicsServer,
        textures: &mut TextureRegistry,
        level: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameworkError> {
        let source = match level {
            0 => SCENE_COLOR_TARGET.to_string(),
            _ => level_name(level - 1),
        };
        let name = level_name(level);
        Ok(Self {
            target: EffectTarget::new(
                server,
                textures,
                &name,
                RenderTargetDescriptor::rectangle(PixelKind::RGBA16F, width, height)
                    .with_linear_filtering(),
            )?,
            name,
            level,
            inputs: [ImmutableString::new(source)],
        })
    }

    pub fn level(&self) -> usize {
        self.level
    }
}

impl ScreenSpaceEffect for DownsampleEffect {
    fn name(&self) -> &str {
        &self.name
    }

    /// Every level depends on the previous one.
    fn priority(&self) -> i32 {
        i32::try_from(self.level).unwrap_or(i32::MAX)
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

    fn draw(&mut self, ctx: &mut EffectContext) -> Result<RenderPassStatistics, FrameworkError> {
        let program = ctx.shaders.get(
            ctx.server,
            &ShaderKey::full_screen(builtin::DOWNSAMPLE_FRAGMENT),
        )?;
        let source = ctx.textures.get(&self.inputs[0])?;
        let (width, height) = source.borrow().kind().rectangle_size();

        let mut bindings = Vec::new();
        program.bind_texture(&mut bindings, "source", &source);
        program.bind_uniform(
            &mut bindings,
            "pixelSize",
            Vector2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32),
        );

        self.target.draw_full_screen(ctx, &program, bindings)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_sizes() {
        assert_eq!(level_sizes(8, 4), [(4, 2), (2, 1), (1, 1)]);
        assert_eq!(level_sizes(5, 16), [(2, 8), (1, 4), (1, 2), (1, 1)]);
        assert_eq!(level_sizes(1, 1), [(1, 1)]);
        assert_eq!(final_level_name(1920, 1080), "SceneColorDown9");
    }
}
