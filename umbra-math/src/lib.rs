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

//! Math primitives shared by every crate of the renderer: planes, bounding boxes, frustums and
//! a handful of matrix helpers.

pub mod aabb;
pub mod frustum;
pub mod plane;

use nalgebra::{Matrix4, Scalar, Vector2, Vector3};
use num_traits::NumAssign;

pub use nalgebra;

/// Axis-aligned rectangle, mostly used to describe viewports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect<T>
where
    T: Scalar,
{
    pub position: Vector2<T>,
    pub size: Vector2<T>,
}

impl<T> Rect<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    #[inline]
    pub fn new(x: T, y: T, w: T, h: T) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(w, h),
        }
    }

    #[inline]
    pub fn x(&self) -> T {
        self.position.x
    }

    #[inline]
    pub fn y(&self) -> T {
        self.position.y
    }

    #[inline]
    pub fn w(&self) -> T {
        self.size.x
    }

    #[inline]
    pub fn h(&self) -> T {
        self.size.y
    }

    #[inline]
    pub fn right_bottom_corner(&self) -> Vector2<T> {
        Vector2::new(self.position.x + self.size.x, self.position.y + self.size.y)
    }

    #[inline]
    pub fn contains(&self, point: Vector2<T>) -> bool {
        point.x >= self.position.x
            && point.x <= self.position.x + self.size.x
            && point.y >= self.position.y
            && point.y <= self.position.y + self.size.y
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.x == T::zero() || self.size.y == T::zero()
    }
}

/// Extracts basis vectors and translation from an affine transform.
pub trait Matrix4Ext<T: Scalar> {
    fn side(&self) -> Vector3<T>;
    fn up(&self) -> Vector3<T>;
    fn look(&self) -> Vector3<T>;
    fn position(&self) -> Vector3<T>;
}

impl<T: Scalar + Copy> Matrix4Ext<T> for Matrix4<T> {
    #[inline]
    fn side(&self) -> Vector3<T> {
        Vector3::new(self[0], self[1], self[2])
    }

    #[inline]
    fn up(&self) -> Vector3<T> {
        Vector3::new(self[4], self[5], self[6])
    }

    #[inline]
    fn look(&self) -> Vector3<T> {
        Vector3::new(self[8], self[9], self[10])
    }

    #[inline]
    fn position(&self) -> Vector3<T> {
        Vector3::new(self[12], self[13], self[14])
    }
}

#[inline]
pub fn lerpf(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wraps an angle (in radians) into `(-PI; PI]` range.
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    let mut wrapped = (angle + std::f32::consts::PI) % two_pi;
    if wrapped <= 0.0 {
        wrapped += two_pi;
    }
    wrapped - std::f32::consts::PI
}

/// Orthographic matrix that maps a unit quad onto the whole viewport, used by every full-screen
/// pass.
#[inline]
pub fn make_viewport_matrix(viewport: Rect<i32>) -> Matrix4<f32> {
    Matrix4::new_orthographic(
        0.0,
        viewport.w() as f32,
        viewport.h() as f32,
        0.0,
        -1.0,
        1.0,
    ) * Matrix4::new_nonuniform_scaling(&Vector3::new(
        viewport.w() as f32,
        viewport.h() as f32,
        0.0,
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rect() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(rect.x(), 10);
        assert_eq!(rect.y(), 20);
        assert_eq!(rect.w(), 30);
        assert_eq!(rect.h(), 40);
        assert_eq!(rect.right_bottom_corner(), Vector2::new(40, 60));
        assert!(rect.contains(Vector2::new(15, 25)));
        assert!(!rect.contains(Vector2::new(5, 25)));
        assert!(!rect.is_empty());
        assert!(Rect::new(0, 0, 0, 10).is_empty());
    }

    #[test]
    fn test_wrap_angle() {
        let pi = std::f32::consts::PI;
        assert!((wrap_angle(0.0)).abs() < 1.0e-6);
        assert!((wrap_angle(pi) - pi).abs() < 1.0e-5);
        assert!((wrap_angle(-pi) - pi).abs() < 1.0e-5);
        assert!((wrap_angle(1.5 * pi) + 0.5 * pi).abs() < 1.0e-5);
        assert!((wrap_angle(-1.5 * pi) - 0.5 * pi).abs() < 1.0e-5);
        assert!((wrap_angle(4.0 * pi + 0.25) - 0.25).abs() < 1.0e-4);
    }

    #[test]
    fn test_matrix4_ext() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(m.position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(m.side(), Vector3::x());
        assert_eq!(m.up(), Vector3::y());
        assert_eq!(m.look(), Vector3::z());
    }

    #[test]
    fn test_lerpf() {
        assert_eq!(lerpf(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lerpf(2.0, 4.0, 0.0), 2.0);
    }
}
