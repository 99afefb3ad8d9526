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

use crate::Matrix4Ext;
use nalgebra::{Matrix4, Vector3};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxisAlignedBoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for AxisAlignedBoundingBox {
    #[inline]
    fn default() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }
}

impl AxisAlignedBoundingBox {
    #[inline]
    pub const fn unit() -> Self {
        Self::from_min_max(Vector3::new(-0.5, -0.5, -0.5), Vector3::new(0.5, 0.5, 0.5))
    }

    #[inline]
    pub const fn from_min_max(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_radius(radius: f32) -> Self {
        Self {
            min: Vector3::new(-radius, -radius, -radius),
            max: Vector3::new(radius, radius, radius),
        }
    }

    #[inline]
    pub fn from_points(points: &[Vector3<f32>]) -> Self {
        let mut aabb = AxisAlignedBoundingBox::default();
        for pt in points {
            aabb.add_point(*pt);
        }
        aabb
    }

    #[inline]
    pub fn add_point(&mut self, a: Vector3<f32>) {
        self.min = self.min.inf(&a);
        self.max = self.max.sup(&a);
    }

    #[inline]
    pub fn add_box(&mut self, other: Self) {
        self.add_point(other.min);
        self.add_point(other.max);
    }

    #[inline]
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
        ]
    }

    #[inline]
    pub fn center(&self) -> Vector3<f32> {
        (self.max + self.min).scale(0.5)
    }

    #[inline]
    pub fn half_extents(&self) -> Vector3<f32> {
        (self.max - self.min).scale(0.5)
    }

    /// Radius of a sphere around [`Self::center`] that encloses the box.
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents().norm()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.max.x >= self.min.x && self.max.y >= self.min.y && self.max.z >= self.min.z
    }

    #[inline]
    pub fn is_contains_point(&self, point: Vector3<f32>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Transforms the box by the given affine matrix, the result is the box that encloses the
    /// transformed one.
    #[inline]
    pub fn transform(&self, m: &Matrix4<f32>) -> AxisAlignedBoundingBox {
        let basis = m.fixed_view::<3, 3>(0, 0);

        let mut transformed = Self {
            min: m.position(),
            max: m.position(),
        };

        for i in 0..3 {
            for j in 0..3 {
                let a = basis[(i, j)] * self.min[j];
                let b = basis[(i, j)] * self.max[j];
                if a < b {
                    transformed.min[i] += a;
                    transformed.max[i] += b;
                } else {
                    transformed.min[i] += b;
                    transformed.max[i] += a;
                }
            }
        }

        transformed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_aabb_from_points() {
        let aabb = AxisAlignedBoundingBox::from_points(&[
            Vector3::new(1.0, -2.0, 3.0),
            Vector3::new(-1.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, -3.0),
        ]);
        assert_eq!(aabb.min, Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(aabb.max, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.center(), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.half_extents(), Vector3::new(1.0, 2.0, 3.0));
        assert!(aabb.is_valid());
        assert!(!AxisAlignedBoundingBox::default().is_valid());
    }

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AxisAlignedBoundingBox::unit();
        assert!(aabb.is_contains_point(Vector3::new(0.0, 0.25, -0.5)));
        assert!(!aabb.is_contains_point(Vector3::new(0.0, 0.75, 0.0)));
    }

    #[test]
    fn test_aabb_transform() {
        let aabb = AxisAlignedBoundingBox::unit();

        let translated = aabb.transform(&Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(translated.min, Vector3::new(0.5, 1.5, 2.5));
        assert_eq!(translated.max, Vector3::new(1.5, 2.5, 3.5));

        let rotated = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -0.5, -0.5),
            Vector3::new(1.0, 0.5, 0.5),
        )
        .transform(
            &UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2)
                .to_homogeneous(),
        );
        assert!((rotated.max.x - 0.5).abs() < 1.0e-5);
        assert!((rotated.max.z - 1.0).abs() < 1.0e-5);
        assert!((rotated.min.z + 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn test_bounding_radius() {
        let aabb = AxisAlignedBoundingBox::from_radius(1.0);
        assert!((aabb.bounding_radius() - 3.0f32.sqrt()).abs() < 1.0e-6);
    }
}
