use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::{PixelPoint, PixelRect};

// ── Category ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Ecg,
    Waveform,
    Other(String),
}

impl Category {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("ecg") {
            Category::Ecg
        } else if label.eq_ignore_ascii_case("waveform") {
            Category::Waveform
        } else {
            Category::Other(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Ecg => "ECG",
            Category::Waveform => "Waveform",
            Category::Other(label) => label,
        }
    }

    /// Lowercased label used in exported file names.
    pub fn file_tag(&self) -> String {
        self.label().to_lowercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub rect: PixelRect,
    pub category: Category,
}

// ── Store ───────────────────────────────────────────────────────────────────

/// Committed ROIs plus the gesture currently drawing the next one.
///
/// Undo and redo move whole ROIs between two stacks. Committing a new ROI
/// drops whatever was waiting to be redone.
#[derive(Clone, Debug, Default)]
pub struct RoiStore {
    committed: Vec<Roi>,
    redo_stack: Vec<Roi>,
    pending: Option<Category>,
    drag: Option<PixelRect>,
}

impl RoiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rois(&self) -> &[Roi] {
        &self.committed
    }

    pub fn pending_category(&self) -> Option<&Category> {
        self.pending.as_ref()
    }

    /// The rectangle being dragged, normalized for display.
    pub fn drag_rect(&self) -> Option<PixelRect> {
        self.drag
    }

    pub fn can_undo(&self) -> bool {
        !self.committed.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn begin_roi(&mut self, category: Category) {
        self.pending = Some(category);
        self.drag = None;
    }

    pub fn update_drag(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        self.drag = Some(PixelRect::from_corners(
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y1),
        ));
    }

    /// Turn the dragged rectangle into a committed ROI.
    ///
    /// Returns `None` without committing when there is no pending category,
    /// no rectangle, or the rectangle has no area. An empty rectangle is
    /// dropped but the category stays pending for the next drag.
    pub fn commit_drag(&mut self) -> Option<&Roi> {
        if self.pending.is_none() {
            return None;
        }
        let rect = self.drag.take()?;
        if rect.width() == 0 || rect.height() == 0 {
            return None;
        }
        let category = self.pending.take()?;
        self.redo_stack.clear();
        self.committed.push(Roi { rect, category });
        self.committed.last()
    }

    /// Drop the in-progress drag and pending category. Committed ROIs stay.
    pub fn cancel_drag(&mut self) {
        self.pending = None;
        self.drag = None;
    }

    pub fn undo(&mut self) -> Option<&Roi> {
        let roi = self.committed.pop()?;
        self.redo_stack.push(roi);
        self.redo_stack.last()
    }

    pub fn redo(&mut self) -> Option<&Roi> {
        let roi = self.redo_stack.pop()?;
        self.committed.push(roi);
        self.committed.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(store: &mut RoiStore, category: Category, a: (i32, i32), b: (i32, i32)) {
        store.begin_roi(category);
        store.update_drag(a.0, a.1, a.0, a.1);
        store.update_drag(a.0, a.1, b.0, b.1);
        assert!(store.commit_drag().is_some());
    }

    #[test]
    fn test_commit_normalizes_corners() {
        let mut store = RoiStore::new();
        draw(&mut store, Category::Ecg, (200, 90), (20, 300));
        assert_eq!(
            store.rois()[0].rect,
            PixelRect { x0: 20, y0: 90, x1: 200, y1: 300 }
        );
        assert_eq!(store.pending_category(), None);
        assert_eq!(store.drag_rect(), None);
    }

    #[test]
    fn test_commit_without_drag_is_noop() {
        let mut store = RoiStore::new();
        assert!(store.commit_drag().is_none());
        store.begin_roi(Category::Waveform);
        assert!(store.commit_drag().is_none());
        assert!(store.rois().is_empty());
        // the pending category survives a release without a drag
        assert_eq!(store.pending_category(), Some(&Category::Waveform));
    }

    #[test]
    fn test_commit_rejects_zero_area_rect() {
        let mut store = RoiStore::new();
        store.begin_roi(Category::Ecg);
        store.update_drag(10, 10, 10, 10);
        assert!(store.commit_drag().is_none());
        store.update_drag(10, 10, 80, 10);
        assert!(store.commit_drag().is_none());
        assert!(store.rois().is_empty());
        assert_eq!(store.drag_rect(), None);
        assert_eq!(store.pending_category(), Some(&Category::Ecg));

        store.update_drag(10, 10, 80, 40);
        assert!(store.commit_drag().is_some());
        assert_eq!(store.rois().len(), 1);
    }

    #[test]
    fn test_undo_redo_restores_list() {
        let mut store = RoiStore::new();
        draw(&mut store, Category::Ecg, (0, 0), (10, 10));
        draw(&mut store, Category::Waveform, (5, 5), (50, 60));
        draw(&mut store, Category::Other("Pleth".into()), (1, 2), (3, 4));
        let before = store.rois().to_vec();

        store.undo();
        store.undo();
        assert_eq!(store.rois().len(), 1);
        store.redo();
        store.redo();
        assert_eq!(store.rois(), before.as_slice());
        assert!(!store.can_redo());
    }

    #[test]
    fn test_undo_on_empty_reports_nothing() {
        let mut store = RoiStore::new();
        assert!(store.undo().is_none());
        assert!(store.redo().is_none());
    }

    #[test]
    fn test_commit_after_undo_clears_redo() {
        let mut store = RoiStore::new();
        draw(&mut store, Category::Ecg, (0, 0), (10, 10));
        store.undo();
        assert!(store.can_redo());
        draw(&mut store, Category::Waveform, (1, 1), (2, 2));
        assert!(!store.can_redo());
        assert!(store.redo().is_none());
        assert_eq!(store.rois().len(), 1);
    }

    #[test]
    fn test_cancel_keeps_committed() {
        let mut store = RoiStore::new();
        draw(&mut store, Category::Ecg, (0, 0), (10, 10));
        store.begin_roi(Category::Waveform);
        store.update_drag(0, 0, 4, 4);
        store.cancel_drag();
        assert_eq!(store.rois().len(), 1);
        assert!(store.commit_drag().is_none());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(Category::from_label("ecg"), Category::Ecg);
        assert_eq!(Category::from_label(" Waveform "), Category::Waveform);
        assert_eq!(Category::from_label("SpO2").file_tag(), "spo2");
        assert_eq!(Category::Ecg.file_tag(), "ecg");
    }
}
