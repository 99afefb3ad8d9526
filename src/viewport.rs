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

//! Camera of the main view.
//!
//! View and projection matrices and the frustum are computed on first request and cached until
//! the next [`Viewport::think`]. Auxiliary renders (shadow maps, cube map faces) can temporarily
//! look through the same viewport with [`Viewport::set_override`], overridden values bypass the
//! cache entirely.

use std::cell::Cell;
use umbra_core::{
    algebra::{Matrix4, Point3, Vector2, Vector3},
    math::{frustum::Frustum, wrap_angle},
};

/// Pitch is kept inside this range to avoid flipping the basis when looking straight up or down.
pub const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Perspective projection parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveProjection {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for PerspectiveProjection {
    fn default() -> Self {
        Self {
            fov: 75.0f32.to_radians(),
            z_near: 0.025,
            z_far: 2048.0,
        }
    }
}

impl PerspectiveProjection {
    #[must_use]
    pub fn with_z_near(mut self, z_near: f32) -> Self {
        self.z_near = z_near;
        self
    }

    #[must_use]
    pub fn with_z_far(mut self, z_far: f32) -> Self {
        self.z_far = z_far;
        self
    }

    #[inline]
    pub fn matrix(&self, frame_size: Vector2<f32>) -> Matrix4<f32> {
        let limit = 10.0 * f32::EPSILON;

        let z_near = self.z_far.min(self.z_near);
        let mut z_far = self.z_far.max(self.z_near);

        // Superimposed planes give a degenerate matrix.
        if z_far - z_near < limit {
            z_far += limit;
        }

        Matrix4::new_perspective(
            (frame_size.x / frame_size.y.max(limit)).max(limit),
            self.fov,
            z_near,
            z_far,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewOverride {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

#[derive(Clone, Copy, Debug)]
struct ViewportCache {
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    view_projection: Matrix4<f32>,
    frustum: Frustum,
}

impl ViewportCache {
    fn new(view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            frustum: Frustum::from_view_projection_matrix(view_projection).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Viewport {
    position: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    projection: PerspectiveProjection,
    frame_size: Vector2<f32>,
    view_override: Option<ViewOverride>,
    cache: Cell<Option<ViewportCache>>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            position: Vector3::default(),
            yaw: 0.0,
            pitch: 0.0,
            projection: Default::default(),
            frame_size: Vector2::new(1.0, 1.0),
            view_override: None,
            cache: Cell::new(None),
        }
    }
}

impl Viewport {
    pub fn new(frame_size: Vector2<f32>) -> Self {
        Self {
            frame_size,
            ..Default::default()
        }
    }

    /// Invalidates every cached value, must be called once at the start of each frame.
    pub fn think(&mut self) {
        self.cache.set(None);
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Sets yaw and pitch in radians. Yaw is wrapped into `(-PI; PI]`, pitch is clamped to
    /// [`MAX_PITCH`].
    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = wrap_angle(yaw);
        self.pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.set_orientation(self.yaw + delta_yaw, self.pitch + delta_pitch);
    }

    pub fn projection(&self) -> &PerspectiveProjection {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: PerspectiveProjection) {
        self.projection = projection;
    }

    pub fn frame_size(&self) -> Vector2<f32> {
        self.frame_size
    }

    pub fn set_frame_size(&mut self, frame_size: Vector2<f32>) {
        self.frame_size = frame_size;
    }

    /// Looking direction. Zero yaw and pitch look along -Z.
    pub fn front(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vector3::new(cos_pitch * sin_yaw, sin_pitch, -cos_pitch * cos_yaw)
    }

    pub fn right(&self) -> Vector3<f32> {
        self.front()
            .cross(&Vector3::y())
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x)
    }

    pub fn up(&self) -> Vector3<f32> {
        self.right().cross(&self.front())
    }

    pub fn set_override(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
        self.view_override = Some(ViewOverride { view, projection });
    }

    pub fn clear_override(&mut self) {
        self.view_override = None;
    }

    pub fn view_override(&self) -> Option<&ViewOverride> {
        self.view_override.as_ref()
    }

    fn compute(&self) -> ViewportCache {
        let eye = Point3::from(self.position);
        let view = Matrix4::look_at_rh(&eye, &(eye + self.front()), &self.up());
        ViewportCache::new(view, self.projection.matrix(self.frame_size))
    }

    fn values(&self) -> ViewportCache {
        if let Some(view_override) = self.view_override.as_ref() {
            return ViewportCache::new(view_override.view, view_override.projection);
        }

        match self.cache.get() {
            Some(cache) => cache,
            None => {
                let cache = self.compute();
                self.cache.set(Some(cache));
                cache
            }
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.values().view
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.values().projection
    }

    pub fn view_projection_matrix(&self) -> Matrix4<f32> {
        self.values().view_projection
    }

    pub fn frustum(&self) -> Frustum {
        self.values().frustum
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_default_looks_down_negative_z() {
        let viewport = Viewport::new(Vector2::new(800.0, 600.0));
        assert!((viewport.front() - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
        assert!((viewport.up() - Vector3::y()).norm() < 1e-6);
        assert!((viewport.right() - Vector3::x()).norm() < 1e-6);

        let frustum = viewport.frustum();
        assert!(frustum.is_contains_point(Vector3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.is_contains_point(Vector3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn test_pitch_clamp_and_yaw_wrap() {
        let mut viewport = Viewport::default();
        viewport.set_orientation(0.0, PI);
        assert_eq!(viewport.pitch(), MAX_PITCH);
        viewport.rotate(0.0, -4.0 * PI);
        assert_eq!(viewport.pitch(), -MAX_PITCH);

        viewport.set_orientation(1.5 * PI, 0.0);
        assert!((viewport.yaw() + 0.5 * PI).abs() < 1e-5);
        viewport.set_orientation(PI, 0.0);
        assert!((viewport.yaw() - PI).abs() < 1e-5);
    }

    #[test]
    fn test_cache_lives_until_think() {
        let mut viewport = Viewport::new(Vector2::new(1.0, 1.0));
        let initial = viewport.view_matrix();

        viewport.set_position(Vector3::new(10.0, 0.0, 0.0));
        assert_eq!(viewport.view_matrix(), initial);

        viewport.think();
        assert_ne!(viewport.view_matrix(), initial);
        assert_eq!(
            viewport.view_projection_matrix(),
            viewport.projection_matrix() * viewport.view_matrix()
        );
    }

    #[test]
    fn test_override_bypasses_cache() {
        let mut viewport = Viewport::new(Vector2::new(1.0, 1.0));
        let cached = viewport.view_matrix();

        let view = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -3.0));
        let projection = Matrix4::new_orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        viewport.set_override(view, projection);
        assert_eq!(viewport.view_matrix(), view);
        assert_eq!(viewport.projection_matrix(), projection);

        viewport.clear_override();
        assert_eq!(viewport.view_matrix(), cached);
    }

    #[test]
    fn test_degenerate_planes() {
        let projection = PerspectiveProjection::default()
            .with_z_near(1.0)
            .with_z_far(1.0);
        let m = projection.matrix(Vector2::new(1.0, 1.0));
        assert!(m.iter().all(|v| v.is_finite()));
    }
}
