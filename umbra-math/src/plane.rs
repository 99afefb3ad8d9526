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

use nalgebra::Vector3;

/// Plane in the `n·p + d = 0` form, normal is always unit length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Default for Plane {
    #[inline]
    fn default() -> Self {
        Plane {
            normal: Vector3::new(0.0, 1.0, 0.0),
            d: 0.0,
        }
    }
}

impl Plane {
    /// Creates plane from a point and normal vector at that point.
    /// May fail if normal is degenerated vector.
    #[inline]
    pub fn from_normal_and_point(normal: &Vector3<f32>, point: &Vector3<f32>) -> Option<Self> {
        normal
            .try_normalize(f32::EPSILON)
            .map(|normalized_normal| Self {
                normal: normalized_normal,
                d: -point.dot(&normalized_normal),
            })
    }

    /// Creates plane using coefficients of plane equation Ax + By + Cz + D = 0
    /// May fail if length of normal vector is zero (normal is degenerated vector).
    #[inline]
    pub fn from_abcd(a: f32, b: f32, c: f32, d: f32) -> Option<Self> {
        let normal = Vector3::new(a, b, c);
        let len = normal.norm();
        if len == 0.0 {
            None
        } else {
            let k = 1.0 / len;
            Some(Self {
                normal: normal.scale(k),
                d: d * k,
            })
        }
    }

    /// Signed distance from the plane to the point. Positive on the side the normal points to.
    #[inline]
    pub fn dot(&self, point: &Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.d
    }

    #[inline]
    pub fn distance(&self, point: &Vector3<f32>) -> f32 {
        self.dot(point).abs()
    }

    /// Picks the corner of a box that lies the furthest along the normal of the plane.
    #[inline]
    pub fn positive_vertex(&self, min: &Vector3<f32>, max: &Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            if self.normal.x >= 0.0 { max.x } else { min.x },
            if self.normal.y >= 0.0 { max.y } else { min.y },
            if self.normal.z >= 0.0 { max.z } else { min.z },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plane_sanity_tests() {
        // Computation test
        let plane =
            Plane::from_normal_and_point(&Vector3::new(0.0, 10.0, 0.0), &Vector3::new(0.0, 3.0, 0.0))
                .unwrap();
        assert_eq!(plane.normal, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(plane.d, -3.0);

        // Degenerated normal case
        let plane = Plane::from_normal_and_point(
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 0.0),
        );
        assert!(plane.is_none());

        let plane = Plane::from_abcd(0.0, 0.0, 0.0, 0.0);
        assert!(plane.is_none())
    }

    #[test]
    fn test_plane_from_abcd_normalizes() {
        let plane = Plane::from_abcd(0.0, 2.0, 0.0, 4.0).unwrap();
        assert_eq!(plane.normal, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(plane.d, 2.0);
        assert_eq!(plane.dot(&Vector3::new(0.0, 1.0, 0.0)), 3.0);
        assert_eq!(plane.distance(&Vector3::new(0.0, -5.0, 0.0)), 3.0);
    }

    #[test]
    fn test_positive_vertex() {
        let plane = Plane::from_abcd(-1.0, 1.0, 0.0, 0.0).unwrap();
        let min = Vector3::new(-1.0, -2.0, -3.0);
        let max = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(plane.positive_vertex(&min, &max), Vector3::new(-1.0, 2.0, 3.0));
    }
}
