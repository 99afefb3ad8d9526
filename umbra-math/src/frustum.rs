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

//! View frustum: six inward facing planes and eight corner points built from a combined
//! view-projection matrix.

use crate::{aabb::AxisAlignedBoundingBox, plane::Plane};
use nalgebra::{Matrix4, Vector3};

/// Cosine threshold above which two candidate separating axes are considered the same.
const PARALLEL_AXIS_THRESHOLD: f32 = 0.9995;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    /// 0 - left, 1 - right, 2 - top, 3 - bottom, 4 - far, 5 - near
    pub planes: [Plane; 6],
    /// Near plane corners first (left-bottom, right-bottom, right-top, left-top), then far plane
    /// corners in the same order.
    pub corners: [Vector3<f32>; 8],
}

impl Default for Frustum {
    #[inline]
    fn default() -> Self {
        // Identity matrix always gives the canonical clip cube.
        Self::from_view_projection_matrix(Matrix4::identity()).unwrap_or(Self {
            planes: [Plane::default(); 6],
            corners: [Vector3::default(); 8],
        })
    }
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const FAR: usize = 4;
    pub const NEAR: usize = 5;

    /// Builds the frustum. Returns `None` if the matrix is degenerate (not invertible or gives a
    /// plane with zero-length normal).
    #[inline]
    pub fn from_view_projection_matrix(m: Matrix4<f32>) -> Option<Self> {
        let planes = [
            // Left
            Plane::from_abcd(m[3] + m[0], m[7] + m[4], m[11] + m[8], m[15] + m[12])?,
            // Right
            Plane::from_abcd(m[3] - m[0], m[7] - m[4], m[11] - m[8], m[15] - m[12])?,
            // Top
            Plane::from_abcd(m[3] - m[1], m[7] - m[5], m[11] - m[9], m[15] - m[13])?,
            // Bottom
            Plane::from_abcd(m[3] + m[1], m[7] + m[5], m[11] + m[9], m[15] + m[13])?,
            // Far
            Plane::from_abcd(m[3] - m[2], m[7] - m[6], m[11] - m[10], m[15] - m[14])?,
            // Near
            Plane::from_abcd(m[3] + m[2], m[7] + m[6], m[11] + m[10], m[15] + m[14])?,
        ];

        let inv = m.try_inverse()?;

        let mut corners = [Vector3::default(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let z = if i < 4 { -1.0 } else { 1.0 };
            let (x, y) = match i % 4 {
                0 => (-1.0, -1.0),
                1 => (1.0, -1.0),
                2 => (1.0, 1.0),
                _ => (-1.0, 1.0),
            };
            let clip = inv * nalgebra::Vector4::new(x, y, z, 1.0);
            if clip.w.abs() <= f32::EPSILON {
                return None;
            }
            *corner = clip.xyz().scale(1.0 / clip.w);
        }

        Some(Self { planes, corners })
    }

    #[inline]
    pub fn left(&self) -> &Plane {
        &self.planes[Self::LEFT]
    }

    #[inline]
    pub fn right(&self) -> &Plane {
        &self.planes[Self::RIGHT]
    }

    #[inline]
    pub fn top(&self) -> &Plane {
        &self.planes[Self::TOP]
    }

    #[inline]
    pub fn bottom(&self) -> &Plane {
        &self.planes[Self::BOTTOM]
    }

    #[inline]
    pub fn far(&self) -> &Plane {
        &self.planes[Self::FAR]
    }

    #[inline]
    pub fn near(&self) -> &Plane {
        &self.planes[Self::NEAR]
    }

    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    #[inline]
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        self.corners
    }

    #[inline]
    pub fn near_plane_center(&self) -> Vector3<f32> {
        self.corners[0..4]
            .iter()
            .fold(Vector3::default(), |acc, corner| acc + *corner)
            .scale(1.0 / 4.0)
    }

    #[inline]
    pub fn far_plane_center(&self) -> Vector3<f32> {
        self.corners[4..8]
            .iter()
            .fold(Vector3::default(), |acc, corner| acc + *corner)
            .scale(1.0 / 4.0)
    }

    #[inline]
    pub fn view_direction(&self) -> Vector3<f32> {
        self.far_plane_center() - self.near_plane_center()
    }

    /// Centroid of the eight corners.
    #[inline]
    pub fn center(&self) -> Vector3<f32> {
        self.corners
            .iter()
            .fold(Vector3::default(), |acc, corner| acc + *corner)
            .scale(1.0 / 8.0)
    }

    #[inline]
    pub fn is_contains_point(&self, pt: Vector3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.dot(&pt) >= 0.0)
    }

    /// Conservative sphere test: the sphere is rejected only if it is completely behind at least
    /// one plane. Spheres that straddle the frustum's corners may pass even if they are outside,
    /// but a partially visible sphere is never rejected.
    #[inline]
    pub fn is_intersects_sphere(&self, center: Vector3<f32>, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.dot(&center) >= -radius)
    }

    /// Positive-vertex test. A box is rejected if its corner furthest along a plane's normal is
    /// still behind that plane.
    #[inline]
    pub fn is_intersects_aabb(&self, aabb: &AxisAlignedBoundingBox) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.dot(&plane.positive_vertex(&aabb.min, &aabb.max)) >= 0.0)
    }

    /// Same as [`Self::is_intersects_aabb`], but transforms the box first.
    #[inline]
    pub fn is_intersects_aabb_transform(
        &self,
        aabb: &AxisAlignedBoundingBox,
        transform: &Matrix4<f32>,
    ) -> bool {
        self.is_intersects_aabb(&aabb.transform(transform))
    }

    #[inline]
    pub fn is_intersects_point_cloud(&self, points: &[Vector3<f32>]) -> bool {
        if points.is_empty() {
            return false;
        }
        self.planes
            .iter()
            .all(|plane| points.iter().any(|point| plane.dot(point) >= 0.0))
    }

    /// Six distinct edge directions: four side edges going from the near plane to the far plane
    /// and two edge directions of the near plane.
    fn edge_directions(&self) -> [Vector3<f32>; 6] {
        let c = &self.corners;
        [
            c[4] - c[0],
            c[5] - c[1],
            c[6] - c[2],
            c[7] - c[3],
            c[1] - c[0],
            c[3] - c[0],
        ]
    }

    /// Exact overlap test between two frustums using the separating axis theorem. Candidate axes
    /// are plane normals of both frustums and cross products of their edge directions. This is
    /// too slow for per-object culling, use it for bounding volume checks (cascades, lights).
    pub fn is_intersects_frustum(&self, other: &Frustum) -> bool {
        let mut axes: Vec<Vector3<f32>> = Vec::with_capacity(12 + 36);

        let mut push_axis = |axis: Vector3<f32>| {
            if let Some(axis) = axis.try_normalize(1.0e-6) {
                if axes
                    .iter()
                    .all(|existing| existing.dot(&axis).abs() <= PARALLEL_AXIS_THRESHOLD)
                {
                    axes.push(axis);
                }
            }
        };

        for plane in self.planes.iter().chain(other.planes.iter()) {
            push_axis(plane.normal);
        }

        let self_edges = self.edge_directions();
        let other_edges = other.edge_directions();
        for a in self_edges.iter() {
            for b in other_edges.iter() {
                push_axis(a.cross(b));
            }
        }

        for axis in axes.iter() {
            let (self_min, self_max) = project_points(&self.corners, axis);
            let (other_min, other_max) = project_points(&other.corners, axis);
            if self_max < other_min || other_max < self_min {
                return false;
            }
        }

        true
    }
}

fn project_points(points: &[Vector3<f32>], axis: &Vector3<f32>) -> (f32, f32) {
    points
        .iter()
        .fold((f32::MAX, -f32::MAX), |(min, max), point| {
            let d = point.dot(axis);
            (min.min(d), max.max(d))
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Matrix4, Point3, Vector3};

    fn make_frustum(eye: Vector3<f32>, target: Vector3<f32>) -> Frustum {
        let projection =
            Matrix4::new_perspective(16.0 / 9.0, 75.0f32.to_radians(), 0.1, 100.0);
        let view = Matrix4::look_at_rh(&Point3::from(eye), &Point3::from(target), &Vector3::y());
        Frustum::from_view_projection_matrix(projection * view).unwrap()
    }

    fn default_frustum() -> Frustum {
        make_frustum(Vector3::default(), Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn test_frustum_from_identity_matrix() {
        let f = Frustum::from_view_projection_matrix(Matrix4::identity()).unwrap();

        assert_eq!(f.left(), &Plane::from_abcd(1.0, 0.0, 0.0, 1.0).unwrap());
        assert_eq!(f.right(), &Plane::from_abcd(-1.0, 0.0, 0.0, 1.0).unwrap());
        assert_eq!(f.top(), &Plane::from_abcd(0.0, -1.0, 0.0, 1.0).unwrap());
        assert_eq!(f.bottom(), &Plane::from_abcd(0.0, 1.0, 0.0, 1.0).unwrap());
        assert_eq!(f.far(), &Plane::from_abcd(0.0, 0.0, -1.0, 1.0).unwrap());
        assert_eq!(f.near(), &Plane::from_abcd(0.0, 0.0, 1.0, 1.0).unwrap());

        assert_eq!(
            f.corners(),
            [
                Vector3::new(-1.0, -1.0, -1.0),
                Vector3::new(1.0, -1.0, -1.0),
                Vector3::new(1.0, 1.0, -1.0),
                Vector3::new(-1.0, 1.0, -1.0),
                Vector3::new(-1.0, -1.0, 1.0),
                Vector3::new(1.0, -1.0, 1.0),
                Vector3::new(1.0, 1.0, 1.0),
                Vector3::new(-1.0, 1.0, 1.0),
            ]
        );
        assert_eq!(f.center(), Vector3::default());
        assert_eq!(f.near_plane_center(), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(f.far_plane_center(), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_degenerate_matrix_gives_none() {
        assert!(Frustum::from_view_projection_matrix(Matrix4::zeros()).is_none());
    }

    #[test]
    fn test_planes_point_inward() {
        let f = default_frustum();

        // A point slightly in front of the eye, past the near plane.
        let probe = Vector3::new(0.0, 0.0, -0.2);
        for plane in f.planes() {
            assert!(plane.dot(&probe) >= -1.0e-4);
        }
        assert!(f.is_contains_point(probe));

        // Every corner is on the inner side of every plane (up to rounding).
        for corner in f.corners() {
            for plane in f.planes() {
                assert!(plane.dot(&corner) >= -1.0e-2);
            }
        }

        assert!(f.is_contains_point(f.center()));
        assert!(!f.is_contains_point(Vector3::new(0.0, 0.0, 1.0)));
        assert!(f.view_direction().z < 0.0);
    }

    #[test]
    fn test_sphere_culling_is_conservative() {
        let f = default_frustum();

        // Fully enclosed.
        assert!(f.is_intersects_sphere(Vector3::new(0.0, 0.0, -10.0), 1.0));
        // Straddles the near plane.
        assert!(f.is_intersects_sphere(Vector3::new(0.0, 0.0, 0.0), 0.5));
        // Straddles the left plane.
        assert!(f.is_intersects_sphere(Vector3::new(-20.0, 0.0, -10.0), 15.0));
        // Beyond the far plane by more than its radius.
        assert!(!f.is_intersects_sphere(Vector3::new(0.0, 0.0, -110.0), 5.0));
        // Behind the camera.
        assert!(!f.is_intersects_sphere(Vector3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_aabb_culling() {
        let f = default_frustum();

        let inside = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -1.0, -11.0),
            Vector3::new(1.0, 1.0, -9.0),
        );
        assert!(f.is_intersects_aabb(&inside));

        let straddling_far = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -1.0, -105.0),
            Vector3::new(1.0, 1.0, -95.0),
        );
        assert!(f.is_intersects_aabb(&straddling_far));

        let beyond_far = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -1.0, -130.0),
            Vector3::new(1.0, 1.0, -120.0),
        );
        assert!(!f.is_intersects_aabb(&beyond_far));

        let behind = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -1.0, 5.0),
            Vector3::new(1.0, 1.0, 7.0),
        );
        assert!(!f.is_intersects_aabb(&behind));

        let moved_inside = AxisAlignedBoundingBox::unit().transform(&Matrix4::new_translation(
            &Vector3::new(0.0, 0.0, -20.0),
        ));
        assert!(f.is_intersects_aabb(&moved_inside));
        assert!(f.is_intersects_aabb_transform(
            &AxisAlignedBoundingBox::unit(),
            &Matrix4::new_translation(&Vector3::new(0.0, 0.0, -20.0))
        ));
    }

    #[test]
    fn test_point_cloud() {
        let f = default_frustum();
        assert!(f.is_intersects_point_cloud(&[
            Vector3::new(0.0, 0.0, 50.0),
            Vector3::new(0.0, 0.0, -50.0)
        ]));
        assert!(!f.is_intersects_point_cloud(&[
            Vector3::new(0.0, 0.0, 50.0),
            Vector3::new(0.0, 1.0, 50.0)
        ]));
        assert!(!f.is_intersects_point_cloud(&[]));
    }

    #[test]
    fn test_frustum_frustum_overlap() {
        let a = default_frustum();

        // Same frustum overlaps itself.
        assert!(a.is_intersects_frustum(&a));

        // Looking at the same region from the side.
        let b = make_frustum(Vector3::new(30.0, 0.0, -30.0), Vector3::new(0.0, 0.0, -30.0));
        assert!(a.is_intersects_frustum(&b));
        assert!(b.is_intersects_frustum(&a));

        // Far away behind the first camera, looking further away.
        let c = make_frustum(Vector3::new(0.0, 0.0, 500.0), Vector3::new(0.0, 0.0, 1000.0));
        assert!(!a.is_intersects_frustum(&c));
        assert!(!c.is_intersects_frustum(&a));
    }
}
