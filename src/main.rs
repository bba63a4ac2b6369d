use std::path::PathBuf;

use eframe::egui;
use tracing_subscriber::EnvFilter;

use wavemark::calibration::{Axis, TickValues};
use wavemark::coords::{DisplayMapping, PixelPoint};
use wavemark::overlay::{Overlay, Rgba8};
use wavemark::roi::Category;
use wavemark::session::Tool;
use wavemark::{load_config, AppConfig, Session, WavemarkResult};

// ── Entry fields ────────────────────────────────────────────────────────────

/// Text typed into the calibration panel for one axis.
#[derive(Clone, Debug, Default)]
struct TickEntry {
    v1: String,
    v2: String,
    unit: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Shortcut {
    Cancel,
    UndoRoi,
    RedoRoi,
    Snapshot,
    Previous,
    Next,
}

/// Keyboard shortcut for a key press. Editing keys are left to a focused
/// text field.
fn shortcut(key: egui::Key, modifiers: egui::Modifiers, typing: bool) -> Option<Shortcut> {
    let ctrl = modifiers.command;
    match key {
        egui::Key::Escape => Some(Shortcut::Cancel),
        egui::Key::S if ctrl => Some(Shortcut::Snapshot),
        _ if typing => None,
        egui::Key::Z if ctrl && modifiers.shift => Some(Shortcut::RedoRoi),
        egui::Key::Z if ctrl => Some(Shortcut::UndoRoi),
        egui::Key::ArrowLeft => Some(Shortcut::Previous),
        egui::Key::ArrowRight => Some(Shortcut::Next),
        _ => None,
    }
}

fn color32(c: Rgba8) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}

// ── App ─────────────────────────────────────────────────────────────────────

struct WavemarkApp {
    session: Session,
    texture: Option<egui::TextureHandle>,
    texture_revision: Option<u64>,

    ticks: [TickEntry; 2],
    error_popup: Option<String>,

    // pointer pressed on the image and not yet released
    pressing: bool,
    // source pixel under the cursor
    hover: Option<PixelPoint>,

    // pan & zoom on top of the fitted size
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
}

impl WavemarkApp {
    fn new(session: Session) -> Self {
        Self {
            session,
            texture: None,
            texture_revision: None,
            ticks: Default::default(),
            error_popup: None,
            pressing: false,
            hover: None,
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
        }
    }

    fn entry(&mut self, axis: Axis) -> &mut TickEntry {
        match axis {
            Axis::Horizontal => &mut self.ticks[0],
            Axis::Vertical => &mut self.ticks[1],
        }
    }

    fn navigate(&mut self, delta: isize) {
        if self.session.advance(delta) {
            self.ticks = Default::default();
            self.pressing = false;
            self.pan = egui::Vec2::ZERO;
            self.zoom = 1.0;
        }
    }

    fn report<T>(&mut self, result: WavemarkResult<T>) {
        if let Err(e) = result {
            self.error_popup = Some(e.to_string());
        }
    }

    /// Scale from source pixels to screen points: fitted size times zoom.
    fn display_scale(&self) -> f32 {
        let Some(img) = self.session.state().image() else {
            return 1.0;
        };
        let display = &self.session.config().display;
        let fitted = DisplayMapping::fit(img.dimensions(), (display.max_width, display.max_height));
        fitted.scale() * self.zoom
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let revision = self.session.raster_revision();
        if self.texture_revision == Some(revision) {
            return;
        }
        self.texture_revision = Some(revision);
        self.texture = self.session.state().image().map(|img| {
            let rgba = img.current();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            ctx.load_texture("waveform", color_image, egui::TextureOptions::LINEAR)
        });
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let (w, h) = self.session.mapping().displayed_size();
        egui::Rect::from_center_size(canvas_rect.center() + self.pan, egui::vec2(w, h))
    }

    fn image_to_screen(&self, origin: egui::Pos2, point: PixelPoint) -> egui::Pos2 {
        let (x, y) = self.session.mapping().to_display(point);
        origin + egui::vec2(x, y)
    }

    fn draw_overlay(&self, painter: &egui::Painter, origin: egui::Pos2, overlay: &Overlay) {
        for roi in &overlay.rois {
            let rect = egui::Rect::from_two_pos(
                self.image_to_screen(origin, PixelPoint::new(roi.rect.x0, roi.rect.y0)),
                self.image_to_screen(origin, PixelPoint::new(roi.rect.x1, roi.rect.y1)),
            );
            let color = color32(roi.color);
            painter.rect_stroke(rect, 0.0, egui::Stroke::new(2.0, color), egui::StrokeKind::Middle);
            painter.text(
                rect.left_top() + egui::vec2(3.0, 2.0),
                egui::Align2::LEFT_TOP,
                &roi.label,
                egui::FontId::proportional(12.0),
                color,
            );
        }

        if let Some(drag) = &overlay.drag {
            let rect = egui::Rect::from_two_pos(
                self.image_to_screen(origin, PixelPoint::new(drag.rect.x0, drag.rect.y0)),
                self.image_to_screen(origin, PixelPoint::new(drag.rect.x1, drag.rect.y1)),
            );
            painter.rect_filled(rect, 0.0, color32(drag.fill));
            painter.rect_stroke(
                rect,
                0.0,
                egui::Stroke::new(1.5, color32(drag.stroke)),
                egui::StrokeKind::Middle,
            );
        }

        for tick in &overlay.ticks {
            let center = self.image_to_screen(origin, tick.center);
            painter.circle(
                center,
                wavemark::overlay::TICK_RADIUS as f32,
                color32(tick.fill),
                egui::Stroke::new(1.0, color32(tick.outline)),
            );
            painter.text(
                center + egui::vec2(8.0, -8.0),
                egui::Align2::LEFT_BOTTOM,
                &tick.label,
                egui::FontId::proportional(14.0),
                color32(tick.fill),
            );
        }

        for label in &overlay.labels {
            painter.text(
                self.image_to_screen(origin, label.at),
                egui::Align2::LEFT_TOP,
                &label.text,
                egui::FontId::proportional(16.0),
                color32(label.color),
            );
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let tool = self.session.state().tool().clone();
        let step = self.session.config().tools.rotate_step;
        let categories: Vec<Category> = self
            .session
            .config()
            .categories
            .roi
            .iter()
            .map(|label| Category::from_label(label))
            .collect();

        ui.horizontal_wrapped(|ui| {
            if ui.button("◀ Prev").clicked() {
                self.navigate(-1);
            }
            if ui.button("Next ▶").clicked() {
                self.navigate(1);
            }
            ui.separator();
            if ui.selectable_label(tool == Tool::Crop, "Crop").clicked() {
                self.session.begin_crop();
            }
            let pending = self.session.state().rois().pending_category().cloned();
            for category in categories {
                let active = tool == Tool::Roi && pending.as_ref() == Some(&category);
                if ui
                    .selectable_label(active, format!("ROI: {}", category))
                    .clicked()
                {
                    self.session.begin_roi(category);
                }
            }
            if ui.selectable_label(tool == Tool::Erase, "Erase").clicked() {
                self.session.begin_erase();
            }
            for axis in Axis::ALL {
                let label = format!("{} ticks", axis);
                if ui.selectable_label(tool == Tool::Tick(axis), label).clicked() {
                    self.session.begin_ticks(axis);
                }
            }
            ui.separator();
            if ui.button(format!("⟲ {}°", step)).clicked() {
                self.session.rotate(step);
            }
            if ui.button(format!("⟳ {}°", step)).clicked() {
                self.session.rotate(-step);
            }
            ui.separator();
            let rois = self.session.state().rois();
            let (can_undo, can_redo) = (rois.can_undo(), rois.can_redo());
            if ui.add_enabled(can_undo, egui::Button::new("Undo ROI")).clicked() {
                self.session.undo_roi();
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo ROI")).clicked() {
                self.session.redo_roi();
            }
            ui.separator();
            if ui.button("Save ROIs").clicked() {
                let result = self.session.export_rois();
                self.report(result);
            }
            if ui.button("Save Calibration").clicked() {
                let result = self.session.export_calibration();
                self.report(result);
            }
            if ui.button("Export Snapshot").clicked() {
                let result = self.session.export_annotated();
                self.report(result);
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
        });
    }

    fn calibration_panel(&mut self, ui: &mut egui::Ui) {
        for axis in Axis::ALL {
            ui.heading(format!("{} ticks", axis));
            let cal = self.session.state().calibration().axis(axis).clone();
            for (i, p) in cal.points().iter().enumerate() {
                ui.label(format!("{}{}: ({}, {})", axis.marker_prefix(), i + 1, p.x, p.y));
            }
            match cal.values() {
                TickValues::Set { v1, v2 } => {
                    ui.label(format!("Saved: {} → {} {}", v1, v2, cal.unit()));
                }
                TickValues::Invalid => {
                    ui.colored_label(egui::Color32::RED, "Values are not numeric");
                }
                TickValues::Unset => {}
            }

            let entry = self.entry(axis);
            egui::Grid::new(format!("{}_entry", axis.name()))
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label(format!("{}1 value", axis.marker_prefix()));
                    ui.text_edit_singleline(&mut entry.v1);
                    ui.end_row();
                    ui.label(format!("{}2 value", axis.marker_prefix()));
                    ui.text_edit_singleline(&mut entry.v2);
                    ui.end_row();
                    ui.label("Units");
                    ui.text_edit_singleline(&mut entry.unit);
                    ui.end_row();
                });
            let entry = entry.clone();

            ui.horizontal(|ui| {
                if ui.button("Save values").clicked() {
                    let result = self.session.set_tick_values(
                        axis,
                        &entry.v1,
                        &entry.v2,
                        &entry.unit,
                    );
                    self.report(result);
                }
                if ui.button("Clear").clicked() {
                    self.session.clear_ticks(axis);
                }
            });
            ui.separator();
        }

        ui.heading("Metadata");
        let mut meta = self.session.state().metadata().clone();
        let mut changed = false;
        egui::Grid::new("metadata").num_columns(2).show(ui, |ui| {
            ui.label("Location");
            changed |= ui.text_edit_singleline(&mut meta.location).changed();
            ui.end_row();
            ui.label("Type");
            changed |= ui.text_edit_singleline(&mut meta.waveform_type).changed();
            ui.end_row();
            ui.label("Protocol");
            changed |= ui.text_edit_multiline(&mut meta.protocol).changed();
            ui.end_row();
        });
        changed |= ui.checkbox(&mut meta.co_present, "CO present").changed();
        if changed {
            *self.session.metadata_mut() = meta;
        }
    }

    /// Cursor position, plus its physical value on every calibrated axis.
    fn cursor_readout(&self) -> Option<String> {
        let p = self.hover?;
        let mut text = format!("Cursor: ({}, {})", p.x, p.y);
        let cal = self.session.state().calibration();
        for axis in Axis::ALL {
            if !cal.axis(axis).is_usable() {
                continue;
            }
            if let Ok(value) = self.session.convert(axis, f64::from(axis.coordinate(p))) {
                let unit = cal.axis(axis).unit();
                text.push_str(&format!(" | {}: {:.4} {}", axis, value, unit));
            }
        }
        Some(text)
    }

    fn status_panel(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(self.session.progress().to_string());
            if let Some(readout) = self.cursor_readout() {
                ui.separator();
                ui.label(readout);
            }
        });
        egui::ScrollArea::vertical()
            .max_height(120.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in self.session.log().entries() {
                    ui.monospace(entry);
                }
            });
    }

    fn canvas(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let scale = self.display_scale();
        self.session.set_display_scale(scale);
        let img_rect = self.image_rect_on_screen(canvas_rect);
        let origin = img_rect.min;

        if let Some(tex) = &self.texture {
            painter.image(
                tex.id(),
                img_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        } else {
            painter.text(
                canvas_rect.center(),
                egui::Align2::CENTER_CENTER,
                "No image loaded",
                egui::FontId::proportional(20.0),
                egui::Color32::from_gray(160),
            );
        }

        let overlay = self.session.overlay();
        self.draw_overlay(&painter, origin, &overlay);

        self.hover = response
            .hover_pos()
            .filter(|pos| img_rect.contains(*pos))
            .map(|pos| {
                let local = pos - origin;
                self.session.to_source(local.x, local.y)
            });

        // Pan with the middle button
        let middle_down = ctx.input(|i| i.pointer.middle_down());
        if middle_down {
            self.pan += ctx.input(|i| i.pointer.delta());
            self.panning = true;
        } else {
            self.panning = false;
        }

        // Zoom with the wheel, anchored under the cursor
        let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            let zoom_factor = 1.0 + scroll_delta * 0.002;
            let new_zoom = (self.zoom * zoom_factor).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let cursor_rel = cursor - canvas_rect.center() - self.pan;
                self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
            }
            self.zoom = new_zoom;
        }

        if self.panning {
            return;
        }
        let (pressed, down, released, latest) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.latest_pos(),
            )
        });
        let Some(pos) = latest else {
            return;
        };
        let local = pos - origin;

        if pressed && response.hovered() && img_rect.contains(pos) {
            self.pressing = true;
            self.session.pointer_down(local.x, local.y);
        } else if self.pressing && down && ctx.input(|i| i.pointer.delta()) != egui::Vec2::ZERO {
            self.session.pointer_drag(local.x, local.y);
        }
        if released && self.pressing {
            self.pressing = false;
            self.session.pointer_up(local.x, local.y);
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for WavemarkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);

        let typing = ctx.wants_keyboard_input();
        let shortcuts: Vec<Shortcut> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: true,
                        modifiers,
                        ..
                    } => shortcut(*key, *modifiers, typing),
                    _ => None,
                })
                .collect()
        });
        for action in shortcuts {
            match action {
                Shortcut::Cancel => {
                    self.pressing = false;
                    self.session.cancel();
                }
                Shortcut::UndoRoi => {
                    self.session.undo_roi();
                }
                Shortcut::RedoRoi => {
                    self.session.redo_roi();
                }
                Shortcut::Snapshot => {
                    let result = self.session.export_annotated();
                    self.report(result);
                }
                Shortcut::Previous => self.navigate(-1),
                Shortcut::Next => self.navigate(1),
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status")
            .resizable(true)
            .show(ctx, |ui| self.status_panel(ui));
        egui::SidePanel::right("calibration")
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.calibration_panel(ui));
            });

        // Texture may be stale after toolbar edits made this frame.
        self.ensure_texture(ctx);
        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui, ctx));

        if let Some(message) = self.error_popup.clone() {
            let mut open = true;
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(&message);
                });
            if !open {
                self.error_popup = None;
            }
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let (config, config_error) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config.logging.filter);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "config unreadable, using defaults");
    }

    let dir = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => match rfd::FileDialog::new()
            .set_title("Select Folder with Images")
            .pick_folder()
        {
            Some(dir) => dir,
            None => {
                tracing::error!("no folder selected");
                std::process::exit(1);
            }
        },
    };

    let session = match Session::open(&dir, config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, dir = %dir.display(), "cannot open image folder");
            std::process::exit(1);
        }
    };

    let title = format!("wavemark - {}", dir.display());
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1500.0, 1000.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(WavemarkApp::new(session)))
        }),
    )
    .expect("Failed to run eframe");
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{Key, Modifiers};

    #[test]
    fn test_undo_keys_belong_to_text_field_while_typing() {
        let ctrl_shift = Modifiers::COMMAND | Modifiers::SHIFT;
        assert_eq!(shortcut(Key::Z, Modifiers::COMMAND, false), Some(Shortcut::UndoRoi));
        assert_eq!(shortcut(Key::Z, ctrl_shift, false), Some(Shortcut::RedoRoi));
        assert_eq!(shortcut(Key::Z, Modifiers::COMMAND, true), None);
        assert_eq!(shortcut(Key::Z, ctrl_shift, true), None);
        assert_eq!(shortcut(Key::ArrowLeft, Modifiers::NONE, true), None);
        assert_eq!(shortcut(Key::ArrowRight, Modifiers::NONE, false), Some(Shortcut::Next));
    }

    #[test]
    fn test_escape_and_snapshot_work_while_typing() {
        assert_eq!(shortcut(Key::Escape, Modifiers::NONE, true), Some(Shortcut::Cancel));
        assert_eq!(shortcut(Key::S, Modifiers::COMMAND, true), Some(Shortcut::Snapshot));
        assert_eq!(shortcut(Key::Z, Modifiers::NONE, false), None);
    }
}
