//! Flat per-image export files: ROI crops, a ROI manifest, the calibration
//! table and an annotated snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};
use serde::Serialize;

use crate::calibration::{Axis, AxisCalibration, Calibration, TickValues};
use crate::config::CalibrationSchema;
use crate::coords::PixelRect;
use crate::error::WavemarkResult;
use crate::metadata::Metadata;
use crate::overlay::{burn_in, Overlay};
use crate::roi::{Category, Roi};

pub const MANIFEST_FILE: &str = "rois.json";

/// `{base}_{category}_{ordinal}.png`, ordinal counted from 1.
pub fn roi_file_name(base_name: &str, category: &Category, ordinal: usize) -> String {
    format!("{}_{}_{}.png", base_name, category.file_tag(), ordinal)
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    file: String,
    category: &'a str,
    rect: PixelRect,
}

#[derive(Debug, Serialize)]
struct RoiManifest<'a> {
    source: &'a str,
    width: u32,
    height: u32,
    rois: Vec<ManifestEntry<'a>>,
}

/// What `export_rois` wrote, and the 1-based ordinals it had to skip.
#[derive(Debug, Default, PartialEq)]
pub struct RoiExport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<usize>,
}

/// Crop every ROI out of `image` into `{dest_dir}/{base_name}/`.
///
/// Crops come from the working image as currently edited. ROIs that fall
/// completely outside the image are skipped but keep their ordinal so file
/// names stay aligned with the on-screen order. A `rois.json` manifest
/// listing what was written goes alongside the crops.
pub fn export_rois(
    image: &RgbaImage,
    rois: &[Roi],
    base_name: &str,
    dest_dir: &Path,
) -> WavemarkResult<RoiExport> {
    let folder = dest_dir.join(base_name);
    fs::create_dir_all(&folder)?;

    let (w, h) = image.dimensions();
    let mut report = RoiExport::default();
    let mut entries = Vec::new();
    for (idx, roi) in rois.iter().enumerate() {
        let Some((x, y, cw, ch)) = roi.rect.clamped(w, h) else {
            tracing::warn!(
                ordinal = idx + 1,
                category = %roi.category,
                "ROI lies outside the image, skipped"
            );
            report.skipped.push(idx + 1);
            continue;
        };
        let name = roi_file_name(base_name, &roi.category, idx + 1);
        let path = folder.join(&name);
        imageops::crop_imm(image, x, y, cw, ch)
            .to_image()
            .save_with_format(&path, image::ImageFormat::Png)?;
        tracing::info!(path = %path.display(), "saved ROI");

        entries.push(ManifestEntry {
            file: name,
            category: roi.category.label(),
            rect: roi.rect,
        });
        report.written.push(path);
    }

    let manifest = RoiManifest {
        source: base_name,
        width: w,
        height: h,
        rois: entries,
    };
    fs::write(folder.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;
    Ok(report)
}

// ── Calibration table ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AxisColumns {
    tick1_px: Option<i32>,
    tick1_py: Option<i32>,
    tick2_px: Option<i32>,
    tick2_py: Option<i32>,
    tick1_value: Option<f64>,
    tick2_value: Option<f64>,
    units: String,
}

impl AxisColumns {
    fn from_axis(cal: &AxisCalibration) -> Self {
        let point = |i: usize| cal.points().get(i).copied();
        let (tick1_value, tick2_value) = match cal.values() {
            TickValues::Set { v1, v2 } => (Some(v1), Some(v2)),
            TickValues::Unset | TickValues::Invalid => (None, None),
        };
        Self {
            tick1_px: point(0).map(|p| p.x),
            tick1_py: point(0).map(|p| p.y),
            tick2_px: point(1).map(|p| p.x),
            tick2_py: point(1).map(|p| p.y),
            tick1_value,
            tick2_value,
            units: cal.unit().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WideRow<'a> {
    horizontal_tick1_px: Option<i32>,
    horizontal_tick1_py: Option<i32>,
    horizontal_tick2_px: Option<i32>,
    horizontal_tick2_py: Option<i32>,
    horizontal_tick1_value: Option<f64>,
    horizontal_tick2_value: Option<f64>,
    horizontal_units: String,
    vertical_tick1_px: Option<i32>,
    vertical_tick1_py: Option<i32>,
    vertical_tick2_px: Option<i32>,
    vertical_tick2_py: Option<i32>,
    vertical_tick1_value: Option<f64>,
    vertical_tick2_value: Option<f64>,
    vertical_units: String,
    waveform_type: &'a str,
    waveform_location: &'a str,
    co_present: bool,
    location_free_text: &'a str,
    protocol_free_text: &'a str,
}

impl<'a> WideRow<'a> {
    fn new(cal: &Calibration, meta: &'a Metadata) -> Self {
        let h = AxisColumns::from_axis(cal.axis(Axis::Horizontal));
        let v = AxisColumns::from_axis(cal.axis(Axis::Vertical));
        Self {
            horizontal_tick1_px: h.tick1_px,
            horizontal_tick1_py: h.tick1_py,
            horizontal_tick2_px: h.tick2_px,
            horizontal_tick2_py: h.tick2_py,
            horizontal_tick1_value: h.tick1_value,
            horizontal_tick2_value: h.tick2_value,
            horizontal_units: h.units,
            vertical_tick1_px: v.tick1_px,
            vertical_tick1_py: v.tick1_py,
            vertical_tick2_px: v.tick2_px,
            vertical_tick2_py: v.tick2_py,
            vertical_tick1_value: v.tick1_value,
            vertical_tick2_value: v.tick2_value,
            vertical_units: v.units,
            waveform_type: meta.waveform_type.trim(),
            waveform_location: meta.location.trim(),
            co_present: meta.co_present,
            location_free_text: meta.location.trim(),
            protocol_free_text: meta.protocol.trim(),
        }
    }
}

// csv cannot serialize `#[serde(flatten)]`, so the axis columns are repeated.
#[derive(Debug, Serialize)]
struct AxisRow<'a> {
    axis: Axis,
    tick1_px: Option<i32>,
    tick1_py: Option<i32>,
    tick2_px: Option<i32>,
    tick2_py: Option<i32>,
    tick1_value: Option<f64>,
    tick2_value: Option<f64>,
    units: String,
    waveform_type: &'a str,
    waveform_location: &'a str,
    co_present: bool,
    location_free_text: &'a str,
    protocol_free_text: &'a str,
}

pub fn calibration_file_name(base_name: &str) -> String {
    format!("{}.csv", base_name)
}

/// Write tick positions, values, units and metadata to `{dest_dir}/{base}.csv`.
///
/// Fails before touching the filesystem when required metadata is missing.
pub fn export_calibration(
    calibration: &Calibration,
    metadata: &Metadata,
    schema: CalibrationSchema,
    base_name: &str,
    dest_dir: &Path,
) -> WavemarkResult<PathBuf> {
    metadata.validate()?;

    fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(calibration_file_name(base_name));
    let mut writer = csv::Writer::from_path(&path)?;
    match schema {
        CalibrationSchema::Wide => writer.serialize(WideRow::new(calibration, metadata))?,
        CalibrationSchema::PerAxis => {
            for axis in Axis::ALL {
                let c = AxisColumns::from_axis(calibration.axis(axis));
                writer.serialize(AxisRow {
                    axis,
                    tick1_px: c.tick1_px,
                    tick1_py: c.tick1_py,
                    tick2_px: c.tick2_px,
                    tick2_py: c.tick2_py,
                    tick1_value: c.tick1_value,
                    tick2_value: c.tick2_value,
                    units: c.units,
                    waveform_type: metadata.waveform_type.trim(),
                    waveform_location: metadata.location.trim(),
                    co_present: metadata.co_present,
                    location_free_text: metadata.location.trim(),
                    protocol_free_text: metadata.protocol.trim(),
                })?;
            }
        }
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), ?schema, "saved calibration and metadata");
    Ok(path)
}

/// Save the working image with the overlay burned in as `{base}_annotated.png`.
pub fn export_annotated(
    image: &RgbaImage,
    overlay: &Overlay,
    base_name: &str,
    dest_dir: &Path,
) -> WavemarkResult<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(format!("{}_annotated.png", base_name));
    burn_in(image, overlay).save_with_format(&path, image::ImageFormat::Png)?;
    tracing::info!(path = %path.display(), "saved annotated snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn metadata() -> Metadata {
        Metadata {
            location: "Cath lab".into(),
            waveform_type: "ECG".into(),
            protocol: "12-lead".into(),
            co_present: true,
        }
    }

    fn calibration() -> Calibration {
        let mut cal = Calibration::new();
        cal.add_tick_point(Axis::Horizontal, 100, 400);
        cal.add_tick_point(Axis::Horizontal, 300, 401);
        cal.set_values(Axis::Horizontal, "0", "0.2", "s").unwrap();
        cal.add_tick_point(Axis::Vertical, 20, 350);
        cal
    }

    #[test]
    fn test_roi_crops_named_by_category_and_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_fn(200, 100, |x, _| Rgba([x as u8, 0, 0, 255]));
        let rois = vec![
            Roi {
                rect: PixelRect { x0: 10, y0: 10, x1: 60, y1: 40 },
                category: Category::Ecg,
            },
            Roi {
                rect: PixelRect { x0: 500, y0: 500, x1: 600, y1: 600 },
                category: Category::Ecg,
            },
            Roi {
                rect: PixelRect { x0: 150, y0: 50, x1: 250, y1: 150 },
                category: Category::Waveform,
            },
        ];

        let report = export_rois(&img, &rois, "strip01", dir.path()).unwrap();
        assert_eq!(report.skipped, vec![2]);
        let written = report.written;
        let folder = dir.path().join("strip01");
        assert_eq!(
            written,
            vec![folder.join("strip01_ecg_1.png"), folder.join("strip01_waveform_3.png")]
        );

        let first = image::open(&written[0]).unwrap().to_rgba8();
        assert_eq!(first.dimensions(), (50, 30));
        assert_eq!(first.get_pixel(0, 0), &Rgba([10, 0, 0, 255]));
        let clamped = image::open(&written[1]).unwrap().to_rgba8();
        assert_eq!(clamped.dimensions(), (50, 50));

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(folder.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest["rois"].as_array().unwrap().len(), 2);
        assert_eq!(manifest["rois"][1]["category"], "Waveform");
    }

    #[test]
    fn test_wide_calibration_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_calibration(
            &calibration(),
            &metadata(),
            CalibrationSchema::Wide,
            "strip01",
            dir.path(),
        )
        .unwrap();
        assert_eq!(path, dir.path().join("strip01.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        let get = |name: &str| {
            let i = headers.iter().position(|h| h == name).unwrap();
            rows[0][i].to_string()
        };
        assert_eq!(get("horizontal_tick2_px"), "300");
        assert_eq!(get("horizontal_tick2_value"), "0.2");
        assert_eq!(get("horizontal_units"), "s");
        assert_eq!(get("vertical_tick1_py"), "350");
        assert_eq!(get("vertical_tick2_px"), "");
        assert_eq!(get("vertical_tick1_value"), "");
        assert_eq!(get("waveform_location"), "Cath lab");
        assert_eq!(get("protocol_free_text"), "12-lead");
        assert_eq!(get("co_present"), "true");
    }

    #[test]
    fn test_per_axis_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_calibration(
            &calibration(),
            &metadata(),
            CalibrationSchema::PerAxis,
            "strip01",
            dir.path(),
        )
        .unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "axis");
        assert_eq!(&headers[1], "tick1_px");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "horizontal");
        assert_eq!(&rows[1][0], "vertical");
    }

    #[test]
    fn test_empty_location_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let meta = Metadata {
            location: String::new(),
            ..metadata()
        };
        let result = export_calibration(
            &calibration(),
            &meta,
            CalibrationSchema::Wide,
            "strip01",
            dir.path(),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("strip01.csv").exists());
    }

    #[test]
    fn test_annotated_snapshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let overlay = Overlay::build(&calibration(), &[], None, &metadata());
        let path = export_annotated(&img, &overlay, "strip01", dir.path()).unwrap();
        assert!(path.ends_with("strip01_annotated.png"));
        assert!(path.exists());
    }
}
