//! The working raster and the destructive edits applied to it.

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::coords::{PixelPoint, PixelRect};

pub const ERASE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Current pixels plus the baseline they are derived from.
///
/// `baseline` is the image as loaded, or as last cropped/erased. Rotation is
/// always recomputed from it with the accumulated angle, so repeated rotates
/// never stack interpolation blur.
#[derive(Clone, Debug)]
pub struct WorkingImage {
    current: RgbaImage,
    baseline: RgbaImage,
    rotation_deg: f64,
}

impl WorkingImage {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            baseline: image.clone(),
            current: image,
            rotation_deg: 0.0,
        }
    }

    pub fn current(&self) -> &RgbaImage {
        &self.current
    }

    pub fn baseline(&self) -> &RgbaImage {
        &self.baseline
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.current.dimensions()
    }

    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Replace the image with the part inside `rect`, clamped to bounds.
    ///
    /// The result becomes the new baseline. Returns the applied region as
    /// `(x, y, w, h)`, or `None` when the rectangle misses the image.
    pub fn crop(&mut self, rect: PixelRect) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = self.current.dimensions();
        let (x, y, cw, ch) = rect.clamped(w, h)?;
        let cropped = imageops::crop_imm(&self.current, x, y, cw, ch).to_image();
        *self = Self::new(cropped);
        Some((x, y, cw, ch))
    }

    /// Add `delta_deg` (counter-clockwise) to the accumulated rotation and
    /// re-render from the baseline.
    pub fn rotate(&mut self, delta_deg: f64) {
        self.rotation_deg = (self.rotation_deg + delta_deg).rem_euclid(360.0);
        self.current = rotate_about_center(&self.baseline, self.rotation_deg);
    }

    /// Paint an opaque stroke of `radius` along `points`.
    ///
    /// A rotated image is flattened into the baseline first, otherwise the
    /// next rotate would re-render from pixels that never saw the stroke.
    pub fn erase(&mut self, points: &[PixelPoint], radius: u32) {
        if points.is_empty() {
            return;
        }
        self.bake_rotation();
        let radius = radius as i32;
        let mut paint = |p: PixelPoint| {
            draw_filled_circle_mut(&mut self.current, (p.x, p.y), radius, ERASE_COLOR);
        };
        paint(points[0]);
        for pair in points.windows(2) {
            for p in interpolate(pair[0], pair[1]) {
                paint(p);
            }
        }
        self.baseline = self.current.clone();
    }

    fn bake_rotation(&mut self) {
        if self.rotation_deg != 0.0 {
            self.baseline = self.current.clone();
            self.rotation_deg = 0.0;
        }
    }
}

/// Integer points from `a` (exclusive) to `b` (inclusive), one pixel apart.
fn interpolate(a: PixelPoint, b: PixelPoint) -> impl Iterator<Item = PixelPoint> {
    let (dx, dy) = ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
    (1..=steps).map(move |i| {
        let t = i as f32 / steps as f32;
        PixelPoint::new(
            (a.x as f32 + dx * t).round() as i32,
            (a.y as f32 + dy * t).round() as i32,
        )
    })
}

/// Rotate about the image center onto a canvas large enough for every corner.
///
/// Quarter turns are exact pixel permutations. Other angles are sampled
/// bilinearly with out-of-range reads clamped to the nearest edge pixel.
pub fn rotate_about_center(src: &RgbaImage, angle_deg: f64) -> RgbaImage {
    let angle = angle_deg.rem_euclid(360.0);
    if angle == 0.0 {
        return src.clone();
    } else if angle == 90.0 {
        return imageops::rotate270(src);
    } else if angle == 180.0 {
        return imageops::rotate180(src);
    } else if angle == 270.0 {
        return imageops::rotate90(src);
    }

    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }
    let (sin, cos) = angle.to_radians().sin_cos();
    let (fw, fh) = (f64::from(w), f64::from(h));
    let out_w = (fh * sin.abs() + fw * cos.abs()).round().max(1.0) as u32;
    let out_h = (fh * cos.abs() + fw * sin.abs()).round().max(1.0) as u32;

    let (cx, cy) = (fw / 2.0, fh / 2.0);
    let (ox, oy) = (f64::from(out_w) / 2.0, f64::from(out_h) / 2.0);

    RgbaImage::from_fn(out_w, out_h, |u, v| {
        // inverse of the counter-clockwise forward map
        let ex = f64::from(u) + 0.5 - ox;
        let ey = f64::from(v) + 0.5 - oy;
        let sx = cos * ex - sin * ey + cx - 0.5;
        let sy = sin * ex + cos * ey + cy - 0.5;
        sample_bilinear_clamped(src, sx, sy)
    })
}

fn sample_bilinear_clamped(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = src.dimensions();
    let max_x = f64::from(w - 1);
    let max_y = f64::from(h - 1);
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - f64::from(x0), y - f64::from(y0));

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bottom = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> PixelRect {
        PixelRect { x0, y0, x1, y1 }
    }

    #[test]
    fn test_four_quarter_turns_restore_dimensions() {
        let mut img = WorkingImage::new(gradient(800, 600));
        img.rotate(90.0);
        assert_eq!(img.dimensions(), (600, 800));
        img.rotate(90.0);
        assert_eq!(img.dimensions(), (800, 600));
        img.rotate(90.0);
        img.rotate(90.0);
        assert_eq!(img.dimensions(), (800, 600));
        assert_eq!(img.current(), img.baseline());
    }

    #[test]
    fn test_positive_quarter_turn_is_counter_clockwise() {
        let mut src = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        src.put_pixel(3, 0, Rgba([255, 0, 0, 255]));
        let mut img = WorkingImage::new(src);
        img.rotate(90.0);
        // top-right corner ends up top-left
        assert_eq!(img.current().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_rotation_rederives_from_baseline() {
        let mut a = WorkingImage::new(gradient(64, 48));
        a.rotate(30.0);
        a.rotate(15.0);

        let mut b = WorkingImage::new(gradient(64, 48));
        b.rotate(45.0);

        assert_eq!(a.current(), b.current());
        a.rotate(-45.0);
        assert_eq!(a.current(), a.baseline());
    }

    #[test]
    fn test_arbitrary_angle_grows_canvas_and_replicates_border() {
        let src = RgbaImage::from_pixel(100, 50, Rgba([10, 20, 30, 255]));
        let rotated = rotate_about_center(&src, 45.0);
        // 100 * cos45 + 50 * sin45
        assert_eq!(rotated.dimensions(), (106, 106));
        assert_eq!(rotated.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_crop_then_crop_is_relative() {
        let mut img = WorkingImage::new(gradient(800, 600));
        img.crop(rect(150, 150, 50, 50));
        assert_eq!(img.dimensions(), (100, 100));
        assert_eq!(img.current().get_pixel(0, 0), &Rgba([50, 50, 0, 255]));

        img.crop(rect(10, 20, 30, 60));
        assert_eq!(img.dimensions(), (20, 40));
        assert_eq!(img.current().get_pixel(0, 0), &Rgba([60, 70, 0, 255]));
        assert_eq!(img.current(), img.baseline());
    }

    #[test]
    fn test_crop_clamps_and_rejects_empty() {
        let mut img = WorkingImage::new(gradient(100, 80));
        assert_eq!(img.crop(rect(-20, -20, 500, 40)), Some((0, 0, 100, 40)));
        assert_eq!(img.dimensions(), (100, 40));
        assert_eq!(img.crop(rect(200, 0, 300, 10)), None);
        assert_eq!(img.dimensions(), (100, 40));
    }

    #[test]
    fn test_crop_resets_rotation() {
        let mut img = WorkingImage::new(gradient(80, 40));
        img.rotate(90.0);
        img.crop(rect(0, 0, 40, 40));
        assert_eq!(img.rotation_deg(), 0.0);
        img.rotate(-90.0);
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[test]
    fn test_erase_paints_stroke() {
        let mut img = WorkingImage::new(RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255])));
        img.erase(&[PixelPoint::new(20, 50), PixelPoint::new(80, 50)], 10);
        assert_eq!(img.current().get_pixel(50, 50), &ERASE_COLOR);
        assert_eq!(img.current().get_pixel(50, 58), &ERASE_COLOR);
        assert_eq!(img.current().get_pixel(50, 70), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_erase_survives_later_rotation() {
        let mut img = WorkingImage::new(RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255])));
        img.rotate(90.0);
        img.erase(&[PixelPoint::new(10, 10)], 2);
        img.rotate(-90.0);
        assert_eq!(img.dimensions(), (40, 20));
        let erased = img.current().pixels().filter(|p| **p == ERASE_COLOR).count();
        assert!(erased > 0);
    }
}
