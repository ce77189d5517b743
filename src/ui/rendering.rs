//! Canvas rendering for the grid, widgets, alignment guides and the trash target.
//!
//! Everything is painted from the session's renderer elements; nothing here
//! reads or changes the scene directly.

use super::state::DashboardApp;
use crate::constants;
use crate::registry::WidgetContent;
use crate::render::VisualElement;
use crate::widgets::format_number;
use eframe::egui;
use eframe::epaint::StrokeKind;

const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 193, 7);
const GUIDE_COLOR: egui::Color32 = egui::Color32::from_rgb(233, 30, 99);
const TRASH_COLOR: egui::Color32 = egui::Color32::from_rgb(244, 67, 54);

impl DashboardApp {
    /// Renders all dashboard elements on the canvas.
    ///
    /// Elements are drawn in layers: grid first, then widgets in z-order, then
    /// the alignment guides and the trash target on top.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `canvas_rect` - The screen-space rectangle of the canvas area
    pub fn render_dashboard(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        let renderer = self.session.renderer();
        for element in renderer.elements() {
            self.draw_element(painter, canvas_rect, element, renderer.edit_chrome);
        }

        self.draw_guides(painter, canvas_rect);
        if renderer.trash_visible {
            self.draw_trash(painter, canvas_rect, renderer.trash_active);
        }
    }

    /// Draws a dot at every grid intersection inside the canvas.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let cell = self.session.config().cell_px;
        if cell < 4.0 {
            return;
        }
        let color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 70);
        let mut y = canvas_rect.min.y;
        while y <= canvas_rect.max.y {
            let mut x = canvas_rect.min.x;
            while x <= canvas_rect.max.x {
                painter.circle_filled(egui::pos2(x, y), constants::GRID_DOT_RADIUS, color);
                x += cell;
            }
            y += cell;
        }
    }

    /// Screen rectangle covered by an element.
    fn element_rect(&self, canvas_rect: egui::Rect, element: &VisualElement) -> egui::Rect {
        let cell = self.session.config().cell_px;
        let min = canvas_rect.min
            + egui::vec2(
                element.position.0 as f32 * cell,
                element.position.1 as f32 * cell,
            );
        egui::Rect::from_min_size(
            min,
            egui::vec2(element.size.0 as f32 * cell, element.size.1 as f32 * cell),
        )
    }

    fn draw_element(
        &self,
        painter: &egui::Painter,
        canvas_rect: egui::Rect,
        element: &VisualElement,
        edit_chrome: bool,
    ) {
        let rect = self.element_rect(canvas_rect, element);
        let [r, g, b] = element.color;
        let alpha = if element.dimmed { 70 } else { 255 };
        let accent = egui::Color32::from_rgba_unmultiplied(r, g, b, alpha);
        let body = if self.dark_mode {
            egui::Color32::from_rgba_unmultiplied(48, 48, 52, alpha)
        } else {
            egui::Color32::from_rgba_unmultiplied(255, 255, 255, alpha)
        };
        let text_color = if self.dark_mode {
            egui::Color32::from_gray(230)
        } else {
            egui::Color32::from_gray(30)
        };

        painter.rect_filled(rect, constants::WIDGET_CORNER_RADIUS, body);
        let (stroke_color, stroke_width) = if element.selected && edit_chrome {
            (SELECTION_COLOR, 2.5)
        } else {
            (accent, 1.5)
        };
        painter.rect_stroke(
            rect,
            constants::WIDGET_CORNER_RADIUS,
            egui::Stroke::new(stroke_width, stroke_color),
            StrokeKind::Inside,
        );

        let clipped = painter.with_clip_rect(rect.intersect(canvas_rect));
        clipped.text(
            rect.left_top() + egui::vec2(6.0, 4.0),
            egui::Align2::LEFT_TOP,
            &element.label,
            egui::FontId::proportional(11.0),
            text_color,
        );

        let content_rect = egui::Rect::from_min_max(
            rect.min + egui::vec2(6.0, 18.0),
            rect.max - egui::vec2(6.0, 6.0),
        );
        if content_rect.is_positive() {
            draw_content(&clipped, content_rect, &element.content, accent, text_color);
        }

        if edit_chrome {
            let handle = self.session.config().resize_handle_px;
            let corner = rect.right_bottom();
            let handle_color = if element.selected { SELECTION_COLOR } else { accent };
            painter.add(egui::Shape::convex_polygon(
                vec![
                    corner,
                    corner - egui::vec2(handle, 0.0),
                    corner - egui::vec2(0.0, handle),
                ],
                handle_color,
                egui::Stroke::NONE,
            ));
        }
    }

    /// Draws dashed alignment guides across the whole canvas.
    fn draw_guides(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let guides = self.session.renderer().guides;
        let cell = self.session.config().cell_px;
        let stroke = egui::Stroke::new(1.0, GUIDE_COLOR);
        if let Some(x) = guides.vertical {
            let x = canvas_rect.min.x + x * cell;
            painter.extend(egui::Shape::dashed_line(
                &[egui::pos2(x, canvas_rect.min.y), egui::pos2(x, canvas_rect.max.y)],
                stroke,
                6.0,
                4.0,
            ));
        }
        if let Some(y) = guides.horizontal {
            let y = canvas_rect.min.y + y * cell;
            painter.extend(egui::Shape::dashed_line(
                &[egui::pos2(canvas_rect.min.x, y), egui::pos2(canvas_rect.max.x, y)],
                stroke,
                6.0,
                4.0,
            ));
        }
    }

    /// Draws the trash target; it fills in while a drop would delete.
    fn draw_trash(&self, painter: &egui::Painter, canvas_rect: egui::Rect, active: bool) {
        let Some(trash) = self.session.trash() else {
            return;
        };
        let center = canvas_rect.min + egui::vec2(trash.center.0, trash.center.1);
        let radius = if active {
            constants::TRASH_DRAW_RADIUS_PX * 1.25
        } else {
            constants::TRASH_DRAW_RADIUS_PX
        };
        let fill = if active {
            TRASH_COLOR
        } else {
            egui::Color32::from_rgba_unmultiplied(244, 67, 54, 60)
        };
        painter.circle(center, radius, fill, egui::Stroke::new(2.0, TRASH_COLOR));
        painter.text(
            center,
            egui::Align2::CENTER_CENTER,
            "🗑",
            egui::FontId::proportional(radius),
            egui::Color32::WHITE,
        );
    }
}

/// Paints the type-specific part of a widget inside `rect`.
fn draw_content(
    painter: &egui::Painter,
    rect: egui::Rect,
    content: &WidgetContent,
    accent: egui::Color32,
    text_color: egui::Color32,
) {
    let muted = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 90);
    match content {
        WidgetContent::Button { caption, pressed } => {
            let fill = if *pressed { accent.gamma_multiply(0.6) } else { accent };
            painter.rect_filled(rect, 4.0, fill);
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                caption,
                egui::FontId::proportional(14.0),
                egui::Color32::WHITE,
            );
        }
        WidgetContent::Switch { on } => {
            let track = egui::Rect::from_center_size(
                rect.center(),
                egui::vec2(rect.width().min(44.0), rect.height().min(22.0)),
            );
            let radius = track.height() / 2.0;
            painter.rect_filled(track, radius, if *on { accent } else { muted });
            let knob_x = if *on {
                track.right() - radius
            } else {
                track.left() + radius
            };
            painter.circle_filled(
                egui::pos2(knob_x, track.center().y),
                radius - 2.0,
                egui::Color32::WHITE,
            );
        }
        WidgetContent::Led { lit } => {
            let radius = rect.width().min(rect.height()) / 2.0 - 2.0;
            let fill = if *lit { accent } else { muted };
            painter.circle(
                rect.center(),
                radius.max(2.0),
                fill,
                egui::Stroke::new(1.0, accent),
            );
        }
        WidgetContent::Text { value, unit } => {
            let text = match value {
                Some(value) if unit.is_empty() => value.clone(),
                Some(value) => format!("{value} {unit}"),
                None => "--".to_string(),
            };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(16.0),
                text_color,
            );
        }
        WidgetContent::Slider {
            value,
            min,
            max,
            ..
        } => {
            let fraction = if max > min {
                ((value - min) / (max - min)).clamp(0.0, 1.0) as f32
            } else {
                0.0
            };
            let y = rect.center().y + 6.0;
            let left = egui::pos2(rect.left(), y);
            let right = egui::pos2(rect.right(), y);
            painter.line_segment([left, right], egui::Stroke::new(4.0, muted));
            let knob = egui::pos2(rect.left() + rect.width() * fraction, y);
            painter.line_segment([left, knob], egui::Stroke::new(4.0, accent));
            painter.circle_filled(knob, 7.0, accent);
            painter.text(
                egui::pos2(rect.center().x, rect.top()),
                egui::Align2::CENTER_TOP,
                format_number(*value),
                egui::FontId::proportional(12.0),
                text_color,
            );
        }
        WidgetContent::Image { source } => {
            painter.rect_stroke(rect, 2.0, egui::Stroke::new(1.0, muted), StrokeKind::Inside);
            let caption = if source.is_empty() { "no image" } else { source };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                format!("🖼 {caption}"),
                egui::FontId::proportional(11.0),
                text_color,
            );
        }
        WidgetContent::Camera {
            frames,
            last_frame_bytes,
        } => {
            painter.rect_filled(rect, 2.0, egui::Color32::from_gray(20));
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                format!("📷 {frames} frames\n{last_frame_bytes} bytes"),
                egui::FontId::proportional(11.0),
                egui::Color32::from_gray(200),
            );
        }
        WidgetContent::Thermometer {
            reading,
            min,
            max,
            unit,
        } => {
            let bar = egui::Rect::from_min_max(
                egui::pos2(rect.left(), rect.bottom() - 10.0),
                rect.right_bottom(),
            );
            painter.rect_filled(bar, 5.0, muted);
            if let Some(reading) = reading {
                let fraction = if max > min {
                    ((reading - min) / (max - min)).clamp(0.0, 1.0) as f32
                } else {
                    0.0
                };
                let filled = egui::Rect::from_min_size(
                    bar.min,
                    egui::vec2(bar.width() * fraction, bar.height()),
                );
                painter.rect_filled(filled, 5.0, accent);
            }
            let text = match reading {
                Some(reading) => format!("{}{unit}", format_number(*reading)),
                None => format!("--{unit}"),
            };
            painter.text(
                egui::pos2(rect.center().x, bar.top() - 4.0),
                egui::Align2::CENTER_BOTTOM,
                text,
                egui::FontId::proportional(16.0),
                text_color,
            );
        }
    }
}
