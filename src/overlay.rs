//! What to draw on top of the working image.
//!
//! The session describes markers and rectangles in source-image pixels; the
//! GUI maps them to the screen and paints them. `burn_in` does the same onto
//! a raster for the annotated snapshot export.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
};
use imageproc::rect::Rect;

use crate::calibration::{Axis, Calibration};
use crate::coords::{PixelPoint, PixelRect};
use crate::metadata::Metadata;
use crate::roi::{Category, Roi};

pub type Rgba8 = [u8; 4];

pub const TICK_RADIUS: i32 = 5;
pub const ROI_STROKE: u32 = 2;

const RED: Rgba8 = [255, 0, 0, 255];
const BLUE: Rgba8 = [0, 0, 255, 255];
const GREEN: Rgba8 = [0, 160, 0, 255];
const BLACK: Rgba8 = [0, 0, 0, 255];
const PURPLE: Rgba8 = [128, 0, 128, 255];
const DRAG_STROKE: Rgba8 = [255, 200, 0, 255];
const DRAG_FILL: Rgba8 = [255, 200, 0, 60];

#[derive(Clone, Debug, PartialEq)]
pub struct TickMarker {
    pub center: PixelPoint,
    pub fill: Rgba8,
    pub outline: Rgba8,
    /// `H1`, `H2`, `V1`, `V2`.
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoiBox {
    pub rect: PixelRect,
    pub color: Rgba8,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragBox {
    pub rect: PixelRect,
    pub stroke: Rgba8,
    pub fill: Rgba8,
}

/// Labels anchored to the top-left of the image, in image pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub at: PixelPoint,
    pub text: String,
    pub color: Rgba8,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    pub ticks: Vec<TickMarker>,
    pub rois: Vec<RoiBox>,
    pub drag: Option<DragBox>,
    pub labels: Vec<TextLabel>,
}

pub fn category_color(category: &Category) -> Rgba8 {
    match category {
        Category::Ecg => RED,
        _ => BLUE,
    }
}

fn axis_color(axis: Axis) -> Rgba8 {
    match axis {
        Axis::Horizontal => BLUE,
        Axis::Vertical => GREEN,
    }
}

impl Overlay {
    pub fn build(
        calibration: &Calibration,
        rois: &[Roi],
        drag: Option<PixelRect>,
        metadata: &Metadata,
    ) -> Self {
        let ticks = Axis::ALL
            .iter()
            .flat_map(|&axis| {
                calibration
                    .axis(axis)
                    .points()
                    .iter()
                    .enumerate()
                    .map(move |(i, &center)| TickMarker {
                        center,
                        fill: axis_color(axis),
                        outline: BLACK,
                        label: format!("{}{}", axis.marker_prefix(), i + 1),
                    })
            })
            .collect();

        let rois = rois
            .iter()
            .map(|roi| RoiBox {
                rect: roi.rect,
                color: category_color(&roi.category),
                label: roi.category.label().to_string(),
            })
            .collect();

        let drag = drag.map(|rect| DragBox {
            rect: rect.normalized(),
            stroke: DRAG_STROKE,
            fill: DRAG_FILL,
        });

        let mut labels = Vec::new();
        if !metadata.location.trim().is_empty() || !metadata.waveform_type.trim().is_empty() {
            labels.push(TextLabel {
                at: PixelPoint::new(10, 10),
                text: format!("Location: {}", metadata.location.trim()),
                color: PURPLE,
            });
            labels.push(TextLabel {
                at: PixelPoint::new(10, 30),
                text: format!("Type: {}", metadata.waveform_type.trim()),
                color: PURPLE,
            });
        }

        Self {
            ticks,
            rois,
            drag,
            labels,
        }
    }
}

fn imageproc_rect(rect: PixelRect) -> Option<Rect> {
    let rect = rect.normalized();
    if rect.width() == 0 || rect.height() == 0 {
        return None;
    }
    Some(Rect::at(rect.x0, rect.y0).of_size(rect.width(), rect.height()))
}

fn blend(dst: &mut Rgba<u8>, src: Rgba8) {
    let a = f32::from(src[3]) / 255.0;
    for c in 0..3 {
        let mixed = f32::from(src[c]) * a + f32::from(dst.0[c]) * (1.0 - a);
        dst.0[c] = mixed.round() as u8;
    }
}

/// Paint `overlay` onto a copy of `image`.
///
/// Text labels are skipped: rasterizing glyphs would need a font, and the
/// GUI already shows them.
pub fn burn_in(image: &RgbaImage, overlay: &Overlay) -> RgbaImage {
    let mut out = image.clone();

    if let Some(drag) = &overlay.drag {
        if let Some((x, y, w, h)) = drag.rect.clamped(out.width(), out.height()) {
            for py in y..y + h {
                for px in x..x + w {
                    blend(out.get_pixel_mut(px, py), drag.fill);
                }
            }
        }
        if let Some(rect) = imageproc_rect(drag.rect) {
            draw_hollow_rect_mut(&mut out, rect, Rgba(drag.stroke));
        }
    }

    for roi in &overlay.rois {
        let rect = roi.rect.normalized();
        for inset in 0..ROI_STROKE as i32 {
            let shrunk = PixelRect {
                x0: rect.x0 + inset,
                y0: rect.y0 + inset,
                x1: rect.x1 - inset,
                y1: rect.y1 - inset,
            };
            if let Some(r) = imageproc_rect(shrunk) {
                draw_hollow_rect_mut(&mut out, r, Rgba(roi.color));
            }
        }
    }

    for tick in &overlay.ticks {
        let center = (tick.center.x, tick.center.y);
        draw_filled_circle_mut(&mut out, center, TICK_RADIUS, Rgba(tick.fill));
        draw_hollow_circle_mut(&mut out, center, TICK_RADIUS, Rgba(tick.outline));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_calibration() -> Calibration {
        let mut cal = Calibration::new();
        cal.add_tick_point(Axis::Horizontal, 20, 40);
        cal.add_tick_point(Axis::Horizontal, 60, 40);
        cal.add_tick_point(Axis::Vertical, 5, 70);
        cal
    }

    #[test]
    fn test_build_labels_and_colors() {
        let rois = vec![
            Roi {
                rect: PixelRect { x0: 1, y0: 2, x1: 30, y1: 40 },
                category: Category::Ecg,
            },
            Roi {
                rect: PixelRect { x0: 5, y0: 5, x1: 9, y1: 9 },
                category: Category::Waveform,
            },
        ];
        let overlay = Overlay::build(&sample_calibration(), &rois, None, &Metadata::default());

        let labels: Vec<_> = overlay.ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["H1", "H2", "V1"]);
        assert_eq!(overlay.ticks[2].fill, GREEN);
        assert_eq!(overlay.rois[0].color, RED);
        assert_eq!(overlay.rois[1].color, BLUE);
        assert!(overlay.labels.is_empty());
        assert!(overlay.drag.is_none());
    }

    #[test]
    fn test_metadata_labels_shown_once_filled() {
        let meta = Metadata {
            location: "Ward 3".into(),
            ..Metadata::default()
        };
        let overlay = Overlay::build(&Calibration::new(), &[], None, &meta);
        assert_eq!(overlay.labels[0].text, "Location: Ward 3");
        assert_eq!(overlay.labels[1].text, "Type: ");
    }

    #[test]
    fn test_burn_in_draws_roi_and_translucent_drag() {
        let base = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let rois = vec![Roi {
            rect: PixelRect { x0: 10, y0: 10, x1: 50, y1: 50 },
            category: Category::Ecg,
        }];
        let drag = Some(PixelRect { x0: 90, y0: 90, x1: 60, y1: 60 });
        let overlay = Overlay::build(&Calibration::new(), &rois, drag, &Metadata::default());
        let out = burn_in(&base, &overlay);

        assert_eq!(out.get_pixel(10, 30), &Rgba(RED));
        assert_eq!(out.get_pixel(30, 30), &Rgba([0, 0, 0, 255]));
        let inside_drag = out.get_pixel(75, 75);
        assert!(inside_drag.0[0] > 0 && inside_drag.0[0] < 255);
        // the source is never touched
        assert_eq!(base.get_pixel(10, 30), &Rgba([0, 0, 0, 255]));
    }
}
