//! Mapping between the on-screen canvas and source-image pixels.
//!
//! The canvas always shows the working image with a single uniform scale, so
//! one factor (`displayed_width / source_width`) converts in both directions.

use serde::{Deserialize, Serialize};

/// A pixel position in source-image coordinates.
///
/// Signed because a drag may leave the canvas; consumers clamp where they
/// touch pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in source-image coordinates. Built through `from_corners` it
/// holds `x0 <= x1` and `y0 <= y1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    /// Build from two arbitrary corners, ordering each axis.
    pub fn from_corners(a: PixelPoint, b: PixelPoint) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn normalized(&self) -> Self {
        Self::from_corners(
            PixelPoint::new(self.x0, self.y0),
            PixelPoint::new(self.x1, self.y1),
        )
    }

    pub fn width(&self) -> u32 {
        self.x0.abs_diff(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y0.abs_diff(self.y1)
    }

    /// Normalize, then intersect with `[0, width) x [0, height)`.
    ///
    /// Returns `(x, y, w, h)` ready for `image::imageops::crop_imm`, or `None`
    /// when nothing of the rectangle lies inside the image.
    pub fn clamped(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let rect = self.normalized();
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        let (x0, x1) = (clamp(rect.x0, width), clamp(rect.x1, width));
        let (y0, y1) = (clamp(rect.y0, height), clamp(rect.y1, height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayMapping {
    source_size: (u32, u32),
    displayed_width: f32,
}

impl DisplayMapping {
    pub fn new(source_size: (u32, u32), displayed_width: f32) -> Self {
        Self {
            source_size,
            displayed_width,
        }
    }

    /// Largest scale that fits `source_size` inside `max_size`, never upscaling.
    pub fn fit(source_size: (u32, u32), max_size: (f32, f32)) -> Self {
        let (w, h) = source_size;
        if w == 0 || h == 0 {
            return Self::default();
        }
        let scale = (max_size.0 / w as f32)
            .min(max_size.1 / h as f32)
            .min(1.0);
        Self::new(source_size, w as f32 * scale)
    }

    pub fn has_image(&self) -> bool {
        self.source_size.0 > 0 && self.source_size.1 > 0 && self.displayed_width > 0.0
    }

    pub fn scale(&self) -> f32 {
        if !self.has_image() {
            return 0.0;
        }
        self.displayed_width / self.source_size.0 as f32
    }

    pub fn displayed_size(&self) -> (f32, f32) {
        let scale = self.scale();
        (
            self.source_size.0 as f32 * scale,
            self.source_size.1 as f32 * scale,
        )
    }

    /// Canvas coordinates to source pixels, truncating toward zero.
    ///
    /// Pointer events can arrive before any image exists; those map to the
    /// origin.
    pub fn to_source(&self, display_x: f32, display_y: f32) -> PixelPoint {
        if !self.has_image() {
            return PixelPoint::default();
        }
        let scale = self.scale();
        PixelPoint::new((display_x / scale) as i32, (display_y / scale) as i32)
    }

    pub fn to_display(&self, point: PixelPoint) -> (f32, f32) {
        let scale = self.scale();
        (point.x as f32 * scale, point.y as f32 * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_image_maps_to_origin() {
        let mapping = DisplayMapping::default();
        assert_eq!(mapping.to_source(123.0, 456.0), PixelPoint::new(0, 0));
        assert_eq!(mapping.scale(), 0.0);
    }

    #[test]
    fn test_half_scale_doubles_coordinates() {
        let mapping = DisplayMapping::new((800, 600), 400.0);
        assert_eq!(mapping.to_source(100.0, 50.0), PixelPoint::new(200, 100));
        assert_eq!(mapping.to_display(PixelPoint::new(200, 100)), (100.0, 50.0));
    }

    #[test]
    fn test_truncates_toward_zero() {
        let mapping = DisplayMapping::new((400, 400), 100.0);
        assert_eq!(mapping.to_source(10.9, 3.0), PixelPoint::new(43, 12));
        // negative drags outside the canvas truncate toward zero as well
        assert_eq!(mapping.to_source(-0.3, -0.2), PixelPoint::new(-1, 0));
    }

    #[test]
    fn test_fit_never_upscales() {
        let small = DisplayMapping::fit((400, 300), (1200.0, 900.0));
        assert_eq!(small.scale(), 1.0);

        let large = DisplayMapping::fit((2400, 900), (1200.0, 900.0));
        assert_eq!(large.scale(), 0.5);
        assert_eq!(large.displayed_size(), (1200.0, 450.0));
    }

    #[test]
    fn test_rect_from_corners_and_clamp() {
        let rect = PixelRect::from_corners(PixelPoint::new(150, -20), PixelPoint::new(50, 40));
        assert_eq!(rect, PixelRect { x0: 50, y0: -20, x1: 150, y1: 40 });
        assert_eq!(rect.clamped(100, 100), Some((50, 0, 50, 40)));
        assert_eq!(rect.clamped(40, 100), None);
    }
}
