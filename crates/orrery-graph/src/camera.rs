//! Orthographic camera looking down -Z at the graph plane.

use glam::{Mat4, Vec2, Vec3};
use orrery_engine::coords::Viewport;

use crate::registry::Bounds;

/// Fraction of the fitted extent left empty around the graph.
const FIT_MARGIN: f32 = 0.05;
const MIN_HALF_HEIGHT: f32 = 1e-4;
const MAX_HALF_HEIGHT: f32 = 1e7;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    /// World point at the viewport center.
    pub center: Vec3,
    /// World units from the center to the top edge.
    pub half_height: f32,
    /// Distance from the eye to `center`; the depth range spans twice this.
    pub depth: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { center: Vec3::ZERO, half_height: 1.0, depth: 1.0 }
    }
}

impl Camera {
    /// Frames `bounds` in a viewport. Empty bounds keep the default camera.
    ///
    /// The depth range comes from the bounding corner so every point fits
    /// between the clip planes whatever its z.
    pub fn fit(bounds: &Bounds, viewport: Viewport) -> Self {
        if bounds.is_empty() {
            return Self::default();
        }
        let center = bounds.center();
        let size = bounds.size();
        let half = (size.y * 0.5).max(size.x * 0.5 / viewport.aspect());
        Self {
            center,
            half_height: (half * (1.0 + FIT_MARGIN)).max(1.0),
            depth: (bounds.corner.length() + center.length()).max(1.0),
        }
    }

    pub fn view(&self) -> Mat4 {
        let eye = self.center + Vec3::Z * self.depth;
        Mat4::look_at_rh(eye, self.center, Vec3::Y)
    }

    pub fn projection(&self, viewport: Viewport) -> Mat4 {
        let hh = self.half_height;
        let hw = hh * viewport.aspect();
        Mat4::orthographic_rh(-hw, hw, -hh, hh, 0.0, 2.0 * self.depth)
    }

    /// World units per logical pixel.
    pub fn world_per_pixel(&self, viewport: Viewport) -> f32 {
        2.0 * self.half_height / viewport.height.max(1.0)
    }

    /// World xy under a logical-pixel position (origin top-left, y down).
    pub fn screen_to_world(&self, viewport: Viewport, x: f32, y: f32) -> Vec2 {
        let wpp = self.world_per_pixel(viewport);
        Vec2::new(
            self.center.x + (x - viewport.width * 0.5) * wpp,
            self.center.y - (y - viewport.height * 0.5) * wpp,
        )
    }

    /// Moves the scene with a drag of `(dx, dy)` logical pixels.
    pub fn pan(&mut self, viewport: Viewport, dx: f32, dy: f32) {
        let wpp = self.world_per_pixel(viewport);
        self.center.x -= dx * wpp;
        self.center.y += dy * wpp;
    }

    /// Zooms by `factor` (> 1 zooms in) keeping the world point under
    /// `(x, y)` fixed on screen.
    pub fn zoom_at(&mut self, viewport: Viewport, factor: f32, x: f32, y: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let anchor = self.screen_to_world(viewport, x, y);
        let next = (self.half_height / factor).clamp(MIN_HALF_HEIGHT, MAX_HALF_HEIGHT);
        let applied = self.half_height / next;
        let center = self.center.truncate();
        let moved = anchor - (anchor - center) / applied;
        self.center = moved.extend(self.center.z);
        self.half_height = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(points: &[Vec3]) -> Bounds {
        let mut b = Bounds::EMPTY;
        for &p in points {
            b.include(p);
        }
        b
    }

    #[test]
    fn fit_contains_every_point() {
        let b = bounds(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(5.0, 5.0, 0.0)]);
        let vp = Viewport::new(200.0, 100.0, 1.0);
        let cam = Camera::fit(&b, vp);
        let clip = cam.projection(vp) * cam.view();
        for p in [b.min, b.max] {
            let ndc = clip.project_point3(p);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{p} -> {ndc}");
            assert!((0.0..=1.0).contains(&ndc.z), "{p} -> {ndc}");
        }
    }

    #[test]
    fn depth_range_covers_corner() {
        let b = bounds(&[Vec3::new(-1.0, -1.0, -40.0), Vec3::new(1.0, 1.0, 30.0)]);
        let vp = Viewport::new(100.0, 100.0, 1.0);
        let cam = Camera::fit(&b, vp);
        let clip = cam.projection(vp) * cam.view();
        for z in [-40.0, 30.0] {
            let ndc = clip.project_point3(Vec3::new(0.0, 0.0, z));
            assert!((0.0..=1.0).contains(&ndc.z), "z {z} -> {ndc}");
        }
    }

    #[test]
    fn empty_bounds_keep_default() {
        assert_eq!(Camera::fit(&Bounds::EMPTY, Viewport::default()), Camera::default());
    }

    #[test]
    fn pan_follows_the_pointer() {
        let vp = Viewport::new(100.0, 100.0, 1.0);
        let mut cam = Camera::default();
        let before = cam.screen_to_world(vp, 10.0, 10.0);
        cam.pan(vp, 5.0, -5.0);
        let after = cam.screen_to_world(vp, 15.0, 5.0);
        assert!((before - after).length() < 1e-5);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let vp = Viewport::new(100.0, 80.0, 1.0);
        let mut cam = Camera { center: Vec3::new(3.0, -2.0, 0.0), half_height: 10.0, depth: 5.0 };
        let anchor = cam.screen_to_world(vp, 20.0, 70.0);
        cam.zoom_at(vp, 2.0, 20.0, 70.0);
        assert!((cam.half_height - 5.0).abs() < 1e-6);
        assert!((cam.screen_to_world(vp, 20.0, 70.0) - anchor).length() < 1e-4);
    }
}
