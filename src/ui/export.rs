//! Export utilities: render the dashboard layout to SVG and PNG.
//!
//! The SVG is built from the saved widget geometry at cell scale, so what is
//! exported matches the file on disk rather than transient runtime state.
//! PNG export rasterizes that same SVG with resvg.

use super::file_ops::file_stem;
use super::state::{DashboardApp, ExportOptions, FileOperationResult};
use crate::constants;
use crate::error::ExportError;
use crate::render::{parse_hex_color, FALLBACK_COLOR};
use crate::types::{Dashboard, WidgetType};
use std::fmt::Write as _;
use std::sync::Arc;

impl DashboardApp {
    /// Exports the layout to SVG through a save dialog.
    pub fn export_svg(&mut self, ctx: &eframe::egui::Context) {
        let dashboard = self.session.to_dashboard();
        let (svg, _w, _h) = build_svg(&dashboard, &self.export, self.session.config().cell_px);
        let file_name = format!("{}.svg", file_stem(&dashboard.project.name));
        self.spawn_export(ctx, "SVG", "svg", file_name, svg.into_bytes());
    }

    /// Exports the layout to PNG through a save dialog.
    pub fn export_png(&mut self, ctx: &eframe::egui::Context) {
        let dashboard = self.session.to_dashboard();
        let (svg, width, height) =
            build_svg(&dashboard, &self.export, self.session.config().cell_px);
        match render_png(&svg, width, height, &self.export) {
            Ok(png) => {
                let file_name = format!("{}.png", file_stem(&dashboard.project.name));
                self.spawn_export(ctx, "PNG", "png", file_name, png);
            }
            Err(err) => {
                self.apply_file_result(FileOperationResult::OperationFailed(err.to_string()));
            }
        }
    }

    pub(super) fn spawn_export(
        &self,
        ctx: &eframe::egui::Context,
        filter: &'static str,
        extension: &'static str,
        file_name: String,
        bytes: Vec<u8>,
    ) {
        let sender = self.file.file_operation_sender.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Some(handle) = rfd::AsyncFileDialog::new()
                .add_filter(filter, &[extension])
                .set_file_name(file_name)
                .save_file()
                .await
            {
                let path = handle.path();
                let result = match std::fs::write(path, bytes) {
                    Ok(()) => FileOperationResult::ExportCompleted(path.display().to_string()),
                    Err(e) => FileOperationResult::OperationFailed(format!(
                        "Failed to write {filter}: {e}"
                    )),
                };
                if let Some(tx) = sender {
                    let _ = tx.send(result);
                }
            }
            ctx.request_repaint();
        });
    }
}

/// Builds an SVG of the dashboard layout. Returns (svg, width, height).
///
/// # Arguments
///
/// * `dashboard` - The dashboard to draw
/// * `options` - Margin, background, label and grid settings
/// * `cell_px` - Size of one grid cell in pixels
pub fn build_svg(dashboard: &Dashboard, options: &ExportOptions, cell_px: f32) -> (String, u32, u32) {
    let margin = options.margin_px.max(0.0);
    let cell = cell_px.max(1.0);

    let mut min = (f32::INFINITY, f32::INFINITY);
    let mut max = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for widget in &dashboard.widgets {
        min.0 = min.0.min(widget.position.0 as f32 * cell);
        min.1 = min.1.min(widget.position.1 as f32 * cell);
        max.0 = max.0.max(widget.right() as f32 * cell);
        max.1 = max.1.max(widget.bottom() as f32 * cell);
    }
    // Fallback if there are no widgets: a small empty canvas
    if !min.0.is_finite() {
        min = (0.0, 0.0);
        max = (10.0 * cell, 10.0 * cell);
    }

    let width = ((max.0 - min.0) + 2.0 * margin).ceil().max(1.0) as u32;
    let height = ((max.1 - min.1) + 2.0 * margin).ceil().max(1.0) as u32;
    let map_x = |x: f32| x - min.0 + margin;
    let map_y = |y: f32| y - min.1 + margin;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    );

    if options.include_background {
        let [r, g, b] = options.background_color;
        let _ = writeln!(
            out,
            "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"#{r:02x}{g:02x}{b:02x}\" />"
        );
    }

    if options.include_grid {
        let _ = writeln!(out, "<g fill=\"#9e9e9e\" fill-opacity=\"0.4\">");
        let first_x = (min.0 / cell).floor() * cell;
        let first_y = (min.1 / cell).floor() * cell;
        let mut y = first_y;
        while y <= max.1 {
            let mut x = first_x;
            while x <= max.0 {
                let _ = writeln!(
                    out,
                    "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{}\" />",
                    map_x(x),
                    map_y(y),
                    constants::GRID_DOT_RADIUS
                );
                x += cell;
            }
            y += cell;
        }
        let _ = writeln!(out, "</g>");
    }

    for widget in &dashboard.widgets {
        let [r, g, b] = parse_hex_color(widget.property("color")).unwrap_or(FALLBACK_COLOR);
        let color = format!("#{r:02x}{g:02x}{b:02x}");
        let x = map_x(widget.position.0 as f32 * cell);
        let y = map_y(widget.position.1 as f32 * cell);
        let w = widget.size.0 as f32 * cell;
        let h = widget.size.1 as f32 * cell;
        let radius = constants::WIDGET_CORNER_RADIUS;
        let _ = writeln!(
            out,
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" rx=\"{radius}\" ry=\"{radius}\" fill=\"#ffffff\" stroke=\"{color}\" stroke-width=\"1.5\" />"
        );
        let _ = writeln!(out, "{}", type_glyph(widget.type_tag, x, y, w, h, &color));
        if options.include_labels {
            let _ = writeln!(
                out,
                "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"11\" fill=\"#333333\">{}</text>",
                x + 6.0,
                y + 14.0,
                escape_xml(&widget.label)
            );
        }
    }

    let _ = writeln!(out, "</svg>");
    (out, width, height)
}

/// A small static shape hinting at the widget type.
fn type_glyph(type_tag: WidgetType, x: f32, y: f32, w: f32, h: f32, color: &str) -> String {
    let (cx, cy) = (x + w / 2.0, y + h / 2.0 + 6.0);
    match type_tag {
        WidgetType::Led => format!(
            "<circle cx=\"{cx:.1}\" cy=\"{cy:.1}\" r=\"{:.1}\" fill=\"{color}\" />",
            (w.min(h) / 2.0 - 8.0).max(2.0)
        ),
        WidgetType::Switch => format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"32\" height=\"16\" rx=\"8\" fill=\"{color}\" />",
            cx - 16.0,
            cy - 8.0
        ),
        WidgetType::Slider | WidgetType::Thermometer => format!(
            "<line x1=\"{:.1}\" y1=\"{cy:.1}\" x2=\"{:.1}\" y2=\"{cy:.1}\" stroke=\"{color}\" stroke-width=\"4\" stroke-linecap=\"round\" />",
            x + 8.0,
            x + w - 8.0
        ),
        WidgetType::Button => format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"4\" fill=\"{color}\" />",
            x + 6.0,
            y + 20.0,
            (w - 12.0).max(1.0),
            (h - 26.0).max(1.0)
        ),
        WidgetType::Text | WidgetType::Image | WidgetType::Camera => format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{color}\" fill-opacity=\"0.15\" />",
            x + 6.0,
            y + 20.0,
            (w - 12.0).max(1.0),
            (h - 26.0).max(1.0)
        ),
    }
}

/// Rasterizes an SVG produced by [`build_svg`] into PNG bytes.
///
/// System fonts are only loaded when labels are drawn.
pub fn render_png(
    svg: &str,
    width: u32,
    height: u32,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let mut opt = usvg::Options::default();
    if options.include_labels {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        opt.fontdb = Arc::new(db);
    }
    let tree = usvg::Tree::from_data(svg.as_bytes(), &opt)?;

    let scale = options.png_scale.clamp(0.25, 8.0);
    let out_w = ((width as f32) * scale).round().max(1.0) as u32;
    let out_h = ((height as f32) * scale).round().max(1.0) as u32;
    let mut pixmap = tiny_skia::Pixmap::new(out_w, out_h).ok_or(ExportError::Pixmap {
        width: out_w,
        height: out_h,
    })?;

    let transform = tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    pixmap
        .encode_png()
        .map_err(|e| ExportError::Png(e.to_string()))
}

fn escape_xml(input: &str) -> String {
    let mut s = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            _ => s.push(ch),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{build_sample, SampleKind};

    #[test]
    fn svg_covers_widgets_plus_margin() {
        let dashboard = build_sample(SampleKind::LivingRoom);
        let options = ExportOptions {
            margin_px: 10.0,
            ..ExportOptions::default()
        };
        let (svg, width, height) = build_svg(&dashboard, &options, 20.0);

        let left = dashboard.widgets.iter().map(|w| w.position.0).min().unwrap();
        let right = dashboard.widgets.iter().map(|w| w.right()).max().unwrap();
        assert_eq!(width, (right - left) * 20 + 20);
        assert!(height > 0);
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(">Lamp</text>"));
    }

    #[test]
    fn labels_are_escaped_and_optional() {
        let mut dashboard = build_sample(SampleKind::LabBench);
        dashboard.widgets[0].label = "<A & B>".to_string();

        let (svg, _, _) = build_svg(&dashboard, &ExportOptions::default(), 20.0);
        assert!(svg.contains("&lt;A &amp; B&gt;"));

        let options = ExportOptions {
            include_labels: false,
            ..ExportOptions::default()
        };
        let (svg, _, _) = build_svg(&dashboard, &options, 20.0);
        assert!(!svg.contains("<text"));
    }

    #[test]
    fn empty_dashboard_still_exports() {
        let (svg, width, height) = build_svg(&Dashboard::new(), &ExportOptions::default(), 20.0);
        assert!(width > 0 && height > 0);
        assert!(!svg.contains("stroke-width=\"1.5\""));
    }

    #[test]
    fn png_export_produces_png_bytes() {
        let dashboard = build_sample(SampleKind::Greenhouse);
        let options = ExportOptions {
            include_labels: false,
            png_scale: 1.0,
            ..ExportOptions::default()
        };
        let (svg, width, height) = build_svg(&dashboard, &options, 20.0);
        let png = render_png(&svg, width, height, &options).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
