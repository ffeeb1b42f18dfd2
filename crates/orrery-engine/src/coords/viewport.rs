/// Viewport size in logical pixels plus the device pixel ratio.
///
/// Physical (framebuffer) size is `logical * pixel_ratio`, rounded down and
/// never smaller than one pixel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1.0, height: 1.0, pixel_ratio: 1.0 }
    }
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.pixel_ratio > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Framebuffer size in physical pixels.
    #[inline]
    pub fn physical_size(self) -> (u32, u32) {
        let w = (self.width * self.pixel_ratio).max(1.0) as u32;
        let h = (self.height * self.pixel_ratio).max(1.0) as u32;
        (w, h)
    }

    /// Converts a logical-pixel position to the physical pixel under it.
    ///
    /// Returns `None` when the position lies outside the viewport.
    pub fn to_physical(self, x: f32, y: f32) -> Option<(u32, u32)> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        let (w, h) = self.physical_size();
        let px = (x * self.pixel_ratio) as u32;
        let py = (y * self.pixel_ratio) as u32;
        if px >= w || py >= h { None } else { Some((px, py)) }
    }

    #[inline]
    pub fn aspect(self) -> f32 {
        if self.height > 0.0 { self.width / self.height } else { 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_applies_pixel_ratio() {
        assert_eq!(Viewport::new(100.0, 50.0, 2.0).physical_size(), (200, 100));
    }

    #[test]
    fn physical_size_never_zero() {
        assert_eq!(Viewport::new(0.0, 0.0, 1.0).physical_size(), (1, 1));
    }

    #[test]
    fn to_physical_scales_and_bounds_checks() {
        let vp = Viewport::new(10.0, 10.0, 2.0);
        assert_eq!(vp.to_physical(2.5, 3.0), Some((5, 6)));
        assert_eq!(vp.to_physical(10.0, 1.0), None);
        assert_eq!(vp.to_physical(-1.0, 1.0), None);
    }
}
