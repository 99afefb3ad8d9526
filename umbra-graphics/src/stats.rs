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

use std::{
    fmt::{Display, Formatter},
    ops::{AddAssign, Sub},
};

/// Amount of pipeline state changes a backend performed. Backends with a state cache only count
/// the changes that actually reached the driver.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PipelineStatistics {
    pub texture_binding_changes: usize,
    pub vbo_binding_changes: usize,
    pub vao_binding_changes: usize,
    pub blend_state_changes: usize,
    pub framebuffer_binding_changes: usize,
    pub program_binding_changes: usize,
}

impl Display for PipelineStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline state changes:\n\
            \tTextures: {},\n\
            \tVBO: {},\n\
            \tVAO: {},\n\
            \tFBO: {},\n\
            \tShaders: {},\n\
            \tBlend: {}",
            self.texture_binding_changes,
            self.vbo_binding_changes,
            self.vao_binding_changes,
            self.framebuffer_binding_changes,
            self.program_binding_changes,
            self.blend_state_changes
        )
    }
}

impl AddAssign for PipelineStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.texture_binding_changes += rhs.texture_binding_changes;
        self.vbo_binding_changes += rhs.vbo_binding_changes;
        self.vao_binding_changes += rhs.vao_binding_changes;
        self.blend_state_changes += rhs.blend_state_changes;
        self.framebuffer_binding_changes += rhs.framebuffer_binding_changes;
        self.program_binding_changes += rhs.program_binding_changes;
    }
}

impl Sub for PipelineStatistics {
    type Output = Self;

    // Counters only grow, saturate anyway in case a backend was reset in between.
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            texture_binding_changes: self
                .texture_binding_changes
                .saturating_sub(rhs.texture_binding_changes),
            vbo_binding_changes: self
                .vbo_binding_changes
                .saturating_sub(rhs.vbo_binding_changes),
            vao_binding_changes: self
                .vao_binding_changes
                .saturating_sub(rhs.vao_binding_changes),
            blend_state_changes: self
                .blend_state_changes
                .saturating_sub(rhs.blend_state_changes),
            framebuffer_binding_changes: self
                .framebuffer_binding_changes
                .saturating_sub(rhs.framebuffer_binding_changes),
            program_binding_changes: self
                .program_binding_changes
                .saturating_sub(rhs.program_binding_changes),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pipeline_statistics_arithmetic() {
        let mut a = PipelineStatistics {
            texture_binding_changes: 3,
            program_binding_changes: 1,
            ..Default::default()
        };
        let b = PipelineStatistics {
            texture_binding_changes: 2,
            framebuffer_binding_changes: 4,
            ..Default::default()
        };
        a += b;
        assert_eq!(a.texture_binding_changes, 5);
        assert_eq!(a.framebuffer_binding_changes, 4);

        let delta = a - b;
        assert_eq!(delta.texture_binding_changes, 3);
        assert_eq!(delta.framebuffer_binding_changes, 0);
        assert_eq!(delta.program_binding_changes, 1);
        assert!(a.to_string().starts_with("Pipeline state changes:"));
    }
}
