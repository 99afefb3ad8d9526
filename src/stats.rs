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

//! Per-pass and per-frame rendering statistics.

use std::{
    fmt::{Display, Formatter},
    ops::AddAssign,
};
use umbra_graphics::{geometry_buffer::DrawCallStatistics, stats::PipelineStatistics};

/// GPU statistics of a single render pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RenderPassStatistics {
    /// Amount of draw calls - lower the better.
    pub draw_calls: usize,
    pub triangles_rendered: usize,
}

impl Display for RenderPassStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Draw Calls: {}\n\
            Triangles Rendered: {}",
            self.draw_calls, self.triangles_rendered
        )
    }
}

impl AddAssign for RenderPassStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.triangles_rendered += rhs.triangles_rendered;
    }
}

impl AddAssign<DrawCallStatistics> for RenderPassStatistics {
    fn add_assign(&mut self, rhs: DrawCallStatistics) {
        self.draw_calls += 1;
        self.triangles_rendered += rhs.triangles;
    }
}

/// Lighting statistics.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LightingStatistics {
    /// How many point lights were bound to the forward pass.
    pub point_lights_rendered: usize,
    pub point_shadow_maps_rendered: usize,
    pub spot_lights_rendered: usize,
    pub spot_shadow_maps_rendered: usize,
    /// How many sun lights were bound to the forward pass (zero or one).
    pub sun_lights_rendered: usize,
    /// How many cascades of the sun shadow map were rendered.
    pub cascades_rendered: usize,
    /// How many lights had their shadows skipped because of an error.
    pub shadow_failures: usize,
}

impl AddAssign for LightingStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.point_lights_rendered += rhs.point_lights_rendered;
        self.point_shadow_maps_rendered += rhs.point_shadow_maps_rendered;
        self.spot_lights_rendered += rhs.spot_lights_rendered;
        self.spot_shadow_maps_rendered += rhs.spot_shadow_maps_rendered;
        self.sun_lights_rendered += rhs.sun_lights_rendered;
        self.cascades_rendered += rhs.cascades_rendered;
        self.shadow_failures += rhs.shadow_failures;
    }
}

impl Display for LightingStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lighting Statistics:\n\
            \tPoint Lights: {}\n\
            \tSpot Lights: {}\n\
            \tSun Lights: {}\n\
            \tPoint Shadow Maps: {}\n\
            \tSpot Shadow Maps: {}\n\
            \tShadow Cascades: {}\n\
            \tShadow Failures: {}",
            self.point_lights_rendered,
            self.spot_lights_rendered,
            self.sun_lights_rendered,
            self.point_shadow_maps_rendered,
            self.spot_shadow_maps_rendered,
            self.cascades_rendered,
            self.shadow_failures
        )
    }
}

/// Renderer statistics for one frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    /// Sum over every pass of the frame.
    pub geometry: RenderPassStatistics,
    /// G-buffer pass only.
    pub gbuffer: RenderPassStatistics,
    /// Shadow maps of every light.
    pub shadows: RenderPassStatistics,
    /// Forward lit pass only.
    pub forward: RenderPassStatistics,
    /// Screen-space chain and composite.
    pub post_processing: RenderPassStatistics,
    pub lighting: LightingStatistics,
    /// Pipeline state changes reported by the graphics server before presentation.
    pub pipeline: PipelineStatistics,
    /// Amount of cross-thread actions executed at the start of the frame.
    pub scheduled_actions: usize,
    /// Amount of deferred mesh updates applied during the frame.
    pub mesh_updates: usize,
    /// `true` if the frame only rebuilt render targets and drew nothing.
    pub buffers_recreated: bool,
}

impl FrameStatistics {
    pub(crate) fn add_pass(&mut self, pass: RenderPassStatistics) -> RenderPassStatistics {
        self.geometry += pass;
        pass
    }
}

impl Display for FrameStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\n\
            Scheduled Actions: {}\n\
            Mesh Updates: {}\n\
            {}\n\
            {}",
            self.geometry, self.scheduled_actions, self.mesh_updates, self.lighting, self.pipeline
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_draw_call_accumulation() {
        let mut stats = RenderPassStatistics::default();
        stats += DrawCallStatistics { triangles: 12 };
        stats += DrawCallStatistics { triangles: 2 };
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.triangles_rendered, 14);
        assert_eq!(stats.to_string(), "Draw Calls: 2\nTriangles Rendered: 14");
    }

    #[test]
    fn test_frame_statistics_sum() {
        let mut frame = FrameStatistics::default();
        frame.gbuffer = frame.add_pass(RenderPassStatistics {
            draw_calls: 1,
            triangles_rendered: 12,
        });
        frame.forward = frame.add_pass(RenderPassStatistics {
            draw_calls: 3,
            triangles_rendered: 4,
        });
        assert_eq!(frame.geometry.draw_calls, 4);
        assert_eq!(frame.geometry.triangles_rendered, 16);
        assert!(frame.to_string().starts_with("Draw Calls: 4"));
    }
}
