//! Canvas interaction: pointer routing and palette drops.
//!
//! Screen positions are converted to canvas pixels relative to the top-left
//! of the canvas rectangle before they reach the session, which works in
//! cells from there on.

use super::state::DashboardApp;
use crate::constants;
use crate::layout::{hit_test, HitTarget};
use crate::types::{Mode, WidgetType};
use eframe::egui;
use eframe::epaint::StrokeKind;

impl DashboardApp {
    /// Converts a screen position to canvas pixels.
    ///
    /// # Arguments
    ///
    /// * `canvas_rect` - The screen-space rectangle of the canvas
    /// * `screen_pos` - Position in screen space
    pub fn screen_to_canvas(canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> (f32, f32) {
        let local = screen_pos - canvas_rect.min;
        (local.x, local.y)
    }

    /// Converts a canvas pixel position back to screen space.
    pub fn canvas_to_screen(canvas_rect: egui::Rect, canvas_pos: (f32, f32)) -> egui::Pos2 {
        canvas_rect.min + egui::vec2(canvas_pos.0, canvas_pos.1)
    }

    /// Cell containing a canvas pixel position, clamped to the grid origin.
    fn cell_under(&self, canvas_pos: (f32, f32)) -> (u32, u32) {
        let config = self.session.config();
        (config.cell_at(canvas_pos.0), config.cell_at(canvas_pos.1))
    }

    /// Renders the canvas and handles pointer interaction on it.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    pub fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        self.canvas.last_rect = Some(canvas_rect);

        // Keep the trash target anchored to the bottom center of the canvas
        let trash = (
            canvas_rect.width() / 2.0,
            canvas_rect.height() - constants::TRASH_BOTTOM_OFFSET_PX,
        );
        if self.session.trash().map(|t| t.center) != Some(trash) {
            self.session.set_trash_center(trash);
        }

        self.handle_palette_drop(ui, &response);
        self.handle_canvas_pointer(ui, canvas_rect);
        self.update_cursor(ui, &response);

        self.render_dashboard(&painter, canvas_rect);
        self.draw_drop_preview(ui, &painter, &response);
    }

    /// Places a widget where a palette entry was released over the canvas.
    fn handle_palette_drop(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let Some(payload) = response.dnd_release_payload::<WidgetType>() else {
            return;
        };
        let Some(pos) = ui.input(|i| i.pointer.interact_pos()) else {
            return;
        };
        let (x, y) = self.cell_under(Self::screen_to_canvas(response.rect, pos));
        if let Some(id) = self.session.place_widget(*payload, x, y) {
            log::debug!("dropped {} at ({x}, {y}) as {id}", *payload);
        }
    }

    /// Feeds primary-button presses, moves and releases to the session.
    ///
    /// Only presses that start on the canvas are tracked; the release is
    /// delivered wherever it happens so gestures always terminate.
    fn handle_canvas_pointer(&mut self, ui: &egui::Ui, canvas_rect: egui::Rect) {
        let (pressed, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else {
            return;
        };
        let local = Self::screen_to_canvas(canvas_rect, pos);

        if pressed && canvas_rect.contains(pos) && self.is_canvas_on_top(ui, pos) {
            self.canvas.pointer_captured = true;
            self.canvas.last_pointer = Some(local);
            self.session.pointer_down(local);
        } else if self.canvas.pointer_captured && self.canvas.last_pointer != Some(local) {
            self.canvas.last_pointer = Some(local);
            self.session.pointer_move(local);
        }

        if released && self.canvas.pointer_captured {
            self.canvas.pointer_captured = false;
            self.canvas.last_pointer = None;
            self.session.pointer_up(local);
        }
    }

    /// Returns `false` when a popup or window covers the canvas at `pos`.
    fn is_canvas_on_top(&self, ui: &egui::Ui, pos: egui::Pos2) -> bool {
        ui.ctx()
            .layer_id_at(pos)
            .is_none_or(|layer| layer == ui.layer_id())
    }

    fn update_cursor(&self, ui: &egui::Ui, response: &egui::Response) {
        if self.session.mode() != Mode::Edit {
            return;
        }
        if self.session.gesture().is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
            return;
        }
        let Some(pos) = response.hover_pos() else {
            return;
        };
        let local = Self::screen_to_canvas(response.rect, pos);
        match hit_test(self.session.scene().widgets(), local, self.session.config()) {
            Some((_, HitTarget::ResizeHandle)) => {
                ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeNwSe);
            }
            Some((_, HitTarget::Body)) => {
                ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
            }
            None => {}
        }
    }

    /// Outlines the cells a palette entry would occupy if dropped now.
    fn draw_drop_preview(&self, ui: &egui::Ui, painter: &egui::Painter, response: &egui::Response) {
        let Some(payload) = egui::DragAndDrop::payload::<WidgetType>(ui.ctx()) else {
            return;
        };
        let Some(pos) = ui
            .input(|i| i.pointer.hover_pos())
            .filter(|pos| response.rect.contains(*pos))
        else {
            return;
        };
        let Some(descriptor) = self.session.registry().get(*payload) else {
            return;
        };
        let cell = self.session.config().cell_px;
        let (x, y) = self.cell_under(Self::screen_to_canvas(response.rect, pos));
        let min = Self::canvas_to_screen(response.rect, (x as f32 * cell, y as f32 * cell));
        let size = egui::vec2(
            descriptor.default_size.0 as f32 * cell,
            descriptor.default_size.1 as f32 * cell,
        );
        let rect = egui::Rect::from_min_size(min, size);
        let accent = egui::Color32::from_rgb(100, 150, 255);
        painter.rect_filled(
            rect,
            constants::WIDGET_CORNER_RADIUS,
            egui::Color32::from_rgba_unmultiplied(100, 150, 255, 40),
        );
        painter.rect_stroke(
            rect,
            constants::WIDGET_CORNER_RADIUS,
            egui::Stroke::new(1.5, accent),
            StrokeKind::Inside,
        );
    }
}
