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

//! Cascaded shadow maps of the sun.

use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use umbra_core::{
    algebra::{Matrix4, Point3, Vector3},
    math::{aabb::AxisAlignedBoundingBox, frustum::Frustum},
};

pub const CSM_NUM_CASCADES: usize = 4;

/// Smallest depth range of a single cascade.
const MIN_CASCADE_DEPTH: f32 = 0.01;

/// How the view frustum of the camera is split into cascades.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FrustumSplitOptions {
    /// Far planes of every cascade in world units, the near plane of the first cascade is the
    /// near plane of the camera.
    Absolute { far_planes: [f32; CSM_NUM_CASCADES] },
    /// Far planes of every cascade as fractions of the depth range of the camera.
    Relative { fractions: [f32; CSM_NUM_CASCADES] },
}

impl Default for FrustumSplitOptions {
    fn default() -> Self {
        Self::Absolute {
            far_planes: [5.0, 25.0, 64.0, 160.0],
        }
    }
}

impl FrustumSplitOptions {
    /// Returns `(z_near, z_far)` of every cascade. Ranges are contiguous and strictly increasing
    /// even when the split options are not.
    pub fn ranges(&self, z_near: f32, z_far: f32) -> [(f32, f32); CSM_NUM_CASCADES] {
        let mut ranges = [(0.0, 0.0); CSM_NUM_CASCADES];
        let mut near = z_near;
        for (i, range) in ranges.iter_mut().enumerate() {
            let far = match self {
                FrustumSplitOptions::Absolute { far_planes } => far_planes[i],
                FrustumSplitOptions::Relative { fractions } => {
                    z_near + (z_far - z_near) * fractions[i]
                }
            };
            let far = far.max(near + MIN_CASCADE_DEPTH);
            *range = (near, far);
            near = far;
        }
        ranges
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Cascade {
    pub view_projection: Matrix4<f32>,
    pub z_near: f32,
    pub z_far: f32,
}

/// Computes light-space matrices of every cascade for a sun shining along `light_direction`.
pub fn compute_cascades(
    camera: &Viewport,
    light_direction: Vector3<f32>,
    split_options: &FrustumSplitOptions,
) -> [Cascade; CSM_NUM_CASCADES] {
    let light_direction = light_direction
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vector3::y());
    let up = if light_direction.y.abs() > 0.99 {
        Vector3::z()
    } else {
        Vector3::y()
    };

    let projection = *camera.projection();
    let view = camera.view_matrix();
    let mut cascades = [Cascade::default(); CSM_NUM_CASCADES];

    for (cascade, (z_near, z_far)) in cascades
        .iter_mut()
        .zip(split_options.ranges(projection.z_near, projection.z_far))
    {
        let projection_matrix = projection
            .with_z_near(z_near)
            .with_z_far(z_far)
            .matrix(camera.frame_size());
        let frustum =
            Frustum::from_view_projection_matrix(projection_matrix * view).unwrap_or_default();

        let center = frustum.center();
        let eye = center - light_direction;
        let light_view = Matrix4::look_at_rh(&Point3::from(eye), &Point3::from(center), &up);

        let mut aabb = AxisAlignedBoundingBox::default();
        for corner in frustum.corners() {
            aabb.add_point(light_view.transform_point(&Point3::from(corner)).coords);
        }

        // Casters outside of the camera frustum, but between it and the sun, must still cast
        // shadows.
        let z_mult = 10.0;
        if aabb.min.z < 0.0 {
            aabb.min.z *= z_mult;
        } else {
            aabb.min.z /= z_mult;
        }
        if aabb.max.z < 0.0 {
            aabb.max.z /= z_mult;
        } else {
            aabb.max.z *= z_mult;
        }

        let light_projection = Matrix4::new_orthographic(
            aabb.min.x,
            aabb.max.x,
            aabb.min.y,
            aabb.max.y,
            -aabb.max.z,
            -aabb.min.z,
        );

        *cascade = Cascade {
            view_projection: light_projection * light_view,
            z_near,
            z_far,
        };
    }

    cascades
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::viewport::PerspectiveProjection;
    use umbra_core::algebra::Vector2;

    #[test]
    fn test_absolute_ranges() {
        let ranges = FrustumSplitOptions::default().ranges(0.1, 1000.0);
        assert_eq!(ranges, [(0.1, 5.0), (5.0, 25.0), (25.0, 64.0), (64.0, 160.0)]);
    }

    #[test]
    fn test_ranges_are_strictly_increasing() {
        for options in [
            FrustumSplitOptions::Relative {
                fractions: [0.1, 0.1, 0.05, 1.0],
            },
            FrustumSplitOptions::Absolute {
                far_planes: [0.0, 0.0, 0.0, 0.0],
            },
        ] {
            let ranges = options.ranges(1.0, 100.0);
            assert_eq!(ranges.len(), CSM_NUM_CASCADES);
            assert_eq!(ranges[0].0, 1.0);
            for (i, (near, far)) in ranges.iter().enumerate() {
                assert!(far > near);
                if i > 0 {
                    assert_eq!(*near, ranges[i - 1].1);
                }
            }
        }
    }

    #[test]
    fn test_cascades_cover_their_slice() {
        let mut camera = Viewport::new(Vector2::new(16.0, 9.0));
        camera.set_projection(PerspectiveProjection::default().with_z_near(0.1));
        let options = FrustumSplitOptions::default();
        let cascades = compute_cascades(&camera, Vector3::new(0.3, -1.0, 0.2), &options);
        assert_eq!(cascades.len(), CSM_NUM_CASCADES);

        for cascade in cascades.iter() {
            let depth = 0.5 * (cascade.z_near + cascade.z_far);
            let point = Vector3::new(0.0, 0.0, -depth);
            let clip = cascade.view_projection * point.push(1.0);
            let ndc = clip.xyz() / clip.w;
            assert!(ndc.iter().all(|v| v.abs() <= 1.0), "{ndc:?}");
        }
    }

    #[test]
    fn test_cascade_count_does_not_depend_on_camera() {
        use crate::viewport::MAX_PITCH;

        let options = FrustumSplitOptions::default();
        let positions = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(100.0, 25.0, -300.0),
            Vector3::new(-5000.0, -10.0, 1.5),
        ];
        let orientations = [
            (0.0, 0.0),
            (1.2, MAX_PITCH),
            (-2.5, -MAX_PITCH),
            (std::f32::consts::PI, 0.3),
        ];

        for position in positions {
            for (yaw, pitch) in orientations {
                let mut camera = Viewport::new(Vector2::new(16.0, 9.0));
                camera.set_position(position);
                camera.set_orientation(yaw, pitch);
                camera.think();

                for direction in [
                    Vector3::new(0.3, -1.0, 0.2),
                    Vector3::y(),
                    -Vector3::y(),
                    camera.up(),
                    Vector3::zeros(),
                ] {
                    let cascades = compute_cascades(&camera, direction, &options);
                    assert_eq!(cascades.len(), CSM_NUM_CASCADES);
                    for cascade in cascades.iter() {
                        assert!(
                            cascade.view_projection.iter().all(|v| v.is_finite()),
                            "{position:?} {yaw} {pitch} {direction:?}"
                        );
                        assert!(cascade.z_far > cascade.z_near);
                    }
                }
            }
        }
    }
}
