//! Navigation over a directory of images and everything scoped to the image
//! currently on screen.
//!
//! [`Session`] owns the file list, the current index and one
//! [`SessionState`]. Moving to another image replaces the state wholesale, so
//! ticks, ROIs, metadata and edits never leak between images. All commands
//! are safe to call with no image loaded; they become no-ops with a notice in
//! the activity log.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::calibration::{Axis, Calibration};
use crate::config::AppConfig;
use crate::coords::{DisplayMapping, PixelPoint, PixelRect};
use crate::error::{WavemarkError, WavemarkResult};
use crate::export;
use crate::metadata::Metadata;
use crate::overlay::Overlay;
use crate::raster::WorkingImage;
use crate::roi::{Category, RoiStore};
use crate::scan::find_images;

const LOG_CAPACITY: usize = 200;

// ── Tool / Interaction State ────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Tool {
    #[default]
    None,
    Crop,
    /// Drawing an ROI; the category waits in the ROI store.
    Roi,
    Erase,
    Tick(Axis),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Gesture {
    #[default]
    Idle,
    Dragging {
        start: PixelPoint,
    },
    Erasing {
        last: PixelPoint,
    },
}

/// Messages shown to the user, newest last. Every entry is also traced.
#[derive(Clone, Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<String>,
}

impl ActivityLog {
    pub fn notice(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(message);
    }

    pub fn error(&mut self, context: &str, err: &WavemarkError) {
        let message = format!("{}: {}", context, err);
        tracing::warn!(error = %err, "{}", context);
        self.push(message);
    }

    fn push(&mut self, message: String) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }
}

// ── Per-image state ─────────────────────────────────────────────────────────

/// Everything that belongs to the image on screen.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    path: Option<PathBuf>,
    image: Option<WorkingImage>,
    calibration: Calibration,
    rois: RoiStore,
    metadata: Metadata,
    tool: Tool,
    gesture: Gesture,
    crop_drag: Option<PixelRect>,
}

impl SessionState {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn image(&self) -> Option<&WorkingImage> {
        self.image.as_ref()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn rois(&self) -> &RoiStore {
        &self.rois
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Nothing is committed yet and no gesture is running.
    pub fn is_pristine(&self) -> bool {
        self.rois.rois().is_empty()
            && !self.rois.can_redo()
            && self.rois.pending_category().is_none()
            && self.calibration == Calibration::default()
            && self.metadata == Metadata::default()
            && self.tool == Tool::None
            && self.gesture == Gesture::Idle
            && self.crop_drag.is_none()
            && self.image.as_ref().map_or(true, |img| img.rotation_deg() == 0.0)
    }

    fn base_name(&self) -> Option<String> {
        let stem = self.path.as_ref()?.file_stem()?;
        Some(stem.to_string_lossy().into_owned())
    }
}

/// Counters for the status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// 1-based; 0 when the session is empty.
    pub position: usize,
    pub total: usize,
    pub remaining: usize,
    pub horizontal_ticks: usize,
    pub vertical_ticks: usize,
    pub rois: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Image {} of {} | HorizTicks: {} | VertTicks: {} | ROIs: {} | Images left: {}",
            self.position,
            self.total,
            self.horizontal_ticks,
            self.vertical_ticks,
            self.rois,
            self.remaining
        )
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

pub struct Session {
    /// Scanned directory, when the session came from one.
    root: Option<PathBuf>,
    files: Vec<PathBuf>,
    index: usize,
    state: SessionState,
    log: ActivityLog,
    config: AppConfig,
    display_scale: f32,
    revision: u64,
    raster_revision: u64,
}

impl Session {
    /// Scan `dir` and load the first image found.
    pub fn open(dir: &Path, config: AppConfig) -> WavemarkResult<Self> {
        let files = find_images(dir, &config.scan.extensions)?;
        let mut session = Self::from_files(files, config);
        session.root = Some(dir.to_path_buf());
        if session.files.is_empty() {
            session
                .log
                .notice(format!("No images found in the directory: {}", dir.display()));
        }
        Ok(session)
    }

    pub fn from_files(files: Vec<PathBuf>, config: AppConfig) -> Self {
        let mut session = Self {
            root: None,
            files,
            index: 0,
            state: SessionState::default(),
            log: ActivityLog::default(),
            config,
            display_scale: 1.0,
            revision: 0,
            raster_revision: 0,
        };
        session
            .log
            .notice(format!("Total images to process: {}", session.files.len()));
        if !session.files.is_empty() {
            session.load_current();
        }
        session
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bumped by every change the display may need to reflect.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Bumped only when working-image pixels change.
    pub fn raster_revision(&self) -> u64 {
        self.raster_revision
    }

    fn changed(&mut self) {
        self.revision += 1;
    }

    fn raster_changed(&mut self) {
        self.raster_revision += 1;
        self.changed();
    }

    pub fn progress(&self) -> Progress {
        let total = self.files.len();
        let position = if total == 0 { 0 } else { self.index + 1 };
        let cal = &self.state.calibration;
        Progress {
            position,
            total,
            remaining: total - position,
            horizontal_ticks: cal.axis(Axis::Horizontal).points().len(),
            vertical_ticks: cal.axis(Axis::Vertical).points().len(),
            rois: self.state.rois.rois().len(),
        }
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    fn load_current(&mut self) {
        let Some(path) = self.files.get(self.index).cloned() else {
            self.log.notice("No images to load.");
            return;
        };
        self.state = SessionState {
            path: Some(path.clone()),
            ..SessionState::default()
        };
        match image::open(&path) {
            Ok(img) => {
                self.state.image = Some(WorkingImage::new(img.to_rgba8()));
                let progress = self.progress();
                self.log
                    .notice(format!("Image {} of {}", progress.position, progress.total));
                self.log.notice(format!("Loaded image: {}", path.display()));
            }
            Err(e) => self.log.error(
                &format!("Could not load {}", path.display()),
                &WavemarkError::Image(e),
            ),
        }
        self.raster_changed();
    }

    /// Step `delta` images forward (positive) or back (negative).
    ///
    /// Returns `false` and keeps everything as-is when the step would leave
    /// the list.
    pub fn advance(&mut self, delta: isize) -> bool {
        let Some(target) = self.index.checked_add_signed(delta) else {
            self.log.notice("Already at the first image.");
            return false;
        };
        if target >= self.files.len() {
            self.log.notice(if self.files.is_empty() {
                "No images to navigate."
            } else {
                "Already at the last image."
            });
            return false;
        }
        if delta == 0 {
            return false;
        }
        self.index = target;
        self.load_current();
        true
    }

    pub fn next(&mut self) -> bool {
        self.advance(1)
    }

    pub fn previous(&mut self) -> bool {
        self.advance(-1)
    }

    // ── Display mapping ─────────────────────────────────────────────────────

    /// Ratio of on-screen size to source size currently used by the canvas.
    pub fn set_display_scale(&mut self, scale: f32) {
        self.display_scale = scale;
    }

    pub fn mapping(&self) -> DisplayMapping {
        match &self.state.image {
            Some(img) => {
                let dims = img.dimensions();
                DisplayMapping::new(dims, dims.0 as f32 * self.display_scale)
            }
            None => DisplayMapping::default(),
        }
    }

    pub fn to_source(&self, display_x: f32, display_y: f32) -> PixelPoint {
        self.mapping().to_source(display_x, display_y)
    }

    // ── Tools ───────────────────────────────────────────────────────────────

    fn enter(&mut self, tool: Tool) {
        self.state.gesture = Gesture::Idle;
        self.state.crop_drag = None;
        self.state.rois.cancel_drag();
        self.state.tool = tool;
        self.changed();
    }

    pub fn begin_crop(&mut self) {
        self.enter(Tool::Crop);
        self.log.notice("Draw a rectangle to crop the image.");
    }

    pub fn begin_roi(&mut self, category: Category) {
        self.enter(Tool::Roi);
        self.log.notice(format!(
            "ROI mode: {} - click and drag to select area",
            category
        ));
        self.state.rois.begin_roi(category);
    }

    pub fn begin_erase(&mut self) {
        self.enter(Tool::Erase);
        self.log
            .notice("Eraser mode: drag mouse to erase parts of the image.");
    }

    pub fn begin_ticks(&mut self, axis: Axis) {
        self.enter(Tool::Tick(axis));
        self.log
            .notice(format!("Click two points to define {} ticks.", axis.name()));
    }

    /// Drop every in-progress gesture. Committed data is untouched.
    pub fn cancel(&mut self) {
        self.enter(Tool::None);
    }

    // ── Pointer events (canvas coordinates) ─────────────────────────────────

    /// Start a gesture. Presses that land outside the image are ignored.
    pub fn pointer_down(&mut self, display_x: f32, display_y: f32) {
        let Some(img) = &self.state.image else {
            return;
        };
        let (w, h) = img.dimensions();
        let p = self.to_source(display_x, display_y);
        if p.x < 0 || p.y < 0 || p.x as u32 >= w || p.y as u32 >= h {
            return;
        }
        match self.state.tool.clone() {
            Tool::None => {}
            Tool::Crop => {
                self.state.gesture = Gesture::Dragging { start: p };
                self.state.crop_drag = Some(PixelRect::from_corners(p, p));
                self.changed();
            }
            Tool::Roi => {
                self.state.gesture = Gesture::Dragging { start: p };
                self.state.rois.update_drag(p.x, p.y, p.x, p.y);
                self.changed();
            }
            Tool::Erase => {
                self.state.gesture = Gesture::Erasing { last: p };
                self.erase(&[p]);
            }
            Tool::Tick(axis) => {
                self.add_tick_point(axis, p.x, p.y);
                if self.state.calibration.axis(axis).is_full() {
                    self.state.tool = Tool::None;
                }
            }
        }
    }

    pub fn pointer_drag(&mut self, display_x: f32, display_y: f32) {
        if self.state.image.is_none() {
            return;
        }
        let p = self.to_source(display_x, display_y);
        match (self.state.tool.clone(), self.state.gesture) {
            (Tool::Crop, Gesture::Dragging { start }) => {
                self.state.crop_drag = Some(PixelRect::from_corners(start, p));
                self.changed();
            }
            (Tool::Roi, Gesture::Dragging { start }) => {
                self.state.rois.update_drag(start.x, start.y, p.x, p.y);
                self.changed();
            }
            (Tool::Erase, Gesture::Erasing { last }) => {
                self.state.gesture = Gesture::Erasing { last: p };
                self.erase(&[last, p]);
            }
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, display_x: f32, display_y: f32) {
        if self.state.image.is_none() {
            return;
        }
        self.pointer_drag(display_x, display_y);
        let gesture = std::mem::take(&mut self.state.gesture);
        match (self.state.tool.clone(), gesture) {
            (Tool::Crop, Gesture::Dragging { .. }) => {
                if let Some(rect) = self.state.crop_drag.take() {
                    self.crop(rect);
                }
                self.state.tool = Tool::None;
                self.changed();
            }
            (Tool::Roi, Gesture::Dragging { .. }) => {
                self.commit_roi();
            }
            _ => {}
        }
    }

    // ── Calibration ─────────────────────────────────────────────────────────

    /// Add a tick at source coordinates. Ignored once the axis has two.
    pub fn add_tick_point(&mut self, axis: Axis, x: i32, y: i32) -> bool {
        if self.state.calibration.add_tick_point(axis, x, y) {
            self.log
                .notice(format!("Added {} tick at ({}, {})", axis.name(), x, y));
            self.changed();
            true
        } else {
            self.log.notice(format!(
                "{} ticks already placed; clear them first.",
                axis
            ));
            false
        }
    }

    pub fn clear_ticks(&mut self, axis: Axis) {
        self.state.calibration.clear(axis);
        self.log.notice(format!("Cleared {} ticks.", axis.name()));
        self.changed();
    }

    /// Store the typed values for `axis`.
    ///
    /// Missing tick points are reported and change nothing. Non-numeric
    /// values leave the axis explicitly invalid and are returned as errors.
    pub fn set_tick_values(
        &mut self,
        axis: Axis,
        v1: &str,
        v2: &str,
        unit: &str,
    ) -> WavemarkResult<()> {
        if !self.state.calibration.axis(axis).is_full() {
            self.log.notice(format!(
                "Select two points for {} ticks before saving.",
                axis.name()
            ));
            return Ok(());
        }
        let result = self.state.calibration.set_values(axis, v1, v2, unit);
        self.changed();
        match &result {
            Ok(()) => self
                .log
                .notice(format!("Saved {} tick calibration.", axis.name())),
            Err(e) => self.log.error("Calibration not saved", e),
        }
        result
    }

    pub fn convert(&self, axis: Axis, pixel: f64) -> WavemarkResult<f64> {
        self.state.calibration.convert(axis, pixel)
    }

    // ── ROIs ────────────────────────────────────────────────────────────────

    fn commit_roi(&mut self) {
        let committed = self
            .state
            .rois
            .commit_drag()
            .map(|roi| (roi.category.clone(), roi.rect));
        match committed {
            Some((category, r)) => {
                self.state.tool = Tool::None;
                self.log.notice(format!(
                    "Added ROI ({}): ({},{}) to ({},{})",
                    category, r.x0, r.y0, r.x1, r.y1
                ));
            }
            // category stays pending, so the tool stays armed for another drag
            None => self
                .log
                .notice("ROI rectangle is empty; click and drag to select an area."),
        }
        self.changed();
    }

    pub fn undo_roi(&mut self) -> bool {
        let done = self.state.rois.undo().is_some();
        self.log
            .notice(if done { "Undid last ROI" } else { "Nothing to undo." });
        if done {
            self.changed();
        }
        done
    }

    pub fn redo_roi(&mut self) -> bool {
        let done = self.state.rois.redo().is_some();
        self.log
            .notice(if done { "Redid last ROI" } else { "Nothing to redo." });
        if done {
            self.changed();
        }
        done
    }

    // ── Raster edits ────────────────────────────────────────────────────────

    pub fn crop(&mut self, rect: PixelRect) -> bool {
        let Some(img) = self.state.image.as_mut() else {
            return false;
        };
        match img.crop(rect) {
            Some((x, y, w, h)) => {
                self.log.notice(format!(
                    "Cropped image to: ({}, {}), ({}, {})",
                    x,
                    y,
                    x + w,
                    y + h
                ));
                self.raster_changed();
                true
            }
            None => {
                self.log.notice("Crop rectangle is empty; nothing cropped.");
                false
            }
        }
    }

    pub fn rotate(&mut self, delta_deg: f64) {
        let Some(img) = self.state.image.as_mut() else {
            return;
        };
        img.rotate(delta_deg);
        let total = img.rotation_deg();
        self.log.notice(format!(
            "Rotated image by {} degrees (total: {}).",
            delta_deg, total
        ));
        self.raster_changed();
    }

    /// Erase along `points` (source coordinates) with the configured brush.
    pub fn erase(&mut self, points: &[PixelPoint]) {
        let radius = self.config.tools.erase_radius;
        let Some(img) = self.state.image.as_mut() else {
            return;
        };
        img.erase(points, radius);
        self.raster_changed();
    }

    // ── Metadata ────────────────────────────────────────────────────────────

    /// Mutable access to the free-text fields; counts as a change.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.changed();
        &mut self.state.metadata
    }

    // ── Display / export ────────────────────────────────────────────────────

    pub fn overlay(&self) -> Overlay {
        let drag = self.state.crop_drag.or(self.state.rois.drag_rect());
        Overlay::build(
            &self.state.calibration,
            self.state.rois.rois(),
            drag,
            &self.state.metadata,
        )
    }

    /// Base name and directory for exports of the current image.
    ///
    /// With `output_dir` set, the image's folder relative to the scanned root
    /// is kept underneath it so equal file names in different subfolders do
    /// not collide.
    fn export_target(&self) -> Option<(String, PathBuf)> {
        let base = self.state.base_name()?;
        let parent = self.state.path.as_ref()?.parent()?;
        let dir = match &self.config.export.output_dir {
            Some(out) => {
                let relative = self
                    .root
                    .as_deref()
                    .and_then(|root| parent.strip_prefix(root).ok());
                match relative {
                    Some(rel) => out.join(rel),
                    None => out.clone(),
                }
            }
            None => parent.to_path_buf(),
        };
        Some((base, dir))
    }

    fn report<T>(
        &mut self,
        context: &str,
        result: WavemarkResult<T>,
    ) -> WavemarkResult<T> {
        if let Err(e) = &result {
            self.log.error(context, e);
        }
        result
    }

    pub fn export_rois(&mut self) -> WavemarkResult<Vec<PathBuf>> {
        let target = self.export_target();
        let (Some(img), Some((base, dir))) = (self.state.image.as_ref(), target) else {
            self.log.notice("No image loaded.");
            return Ok(Vec::new());
        };
        let rois = self.state.rois.rois();
        if rois.is_empty() {
            self.log.notice("No ROIs to save.");
            return Ok(Vec::new());
        }
        let result = export::export_rois(img.current(), rois, &base, &dir);
        let result = self.report("ROI export failed", result)?;
        for ordinal in &result.skipped {
            self.log.notice(format!(
                "ROI {} lies outside the image and was not saved.",
                ordinal
            ));
        }
        for path in &result.written {
            self.log.notice(format!("Saved ROI: {}", path.display()));
        }
        Ok(result.written)
    }

    pub fn export_calibration(&mut self) -> WavemarkResult<PathBuf> {
        let Some((base, dir)) = self.export_target() else {
            let err = WavemarkError::NoImage;
            self.log.error("Calibration export failed", &err);
            return Err(err);
        };
        let result = export::export_calibration(
            &self.state.calibration,
            &self.state.metadata,
            self.config.export.calibration_schema,
            &base,
            &dir,
        );
        if let Ok(path) = &result {
            self.log.notice(format!(
                "Saved calibration and metadata to: {}",
                path.display()
            ));
        }
        self.report("Calibration export failed", result)
    }

    pub fn export_annotated(&mut self) -> WavemarkResult<PathBuf> {
        let target = self.export_target();
        let (Some(img), Some((base, dir))) = (self.state.image.as_ref(), target) else {
            let err = WavemarkError::NoImage;
            self.log.error("Snapshot export failed", &err);
            return Err(err);
        };
        let overlay = self.overlay();
        let result = export::export_annotated(img.current(), &overlay, &base, &dir);
        if let Ok(path) = &result {
            self.log.notice(format!("Exported to {}", path.display()));
        }
        self.report("Snapshot export failed", result)
    }
}
