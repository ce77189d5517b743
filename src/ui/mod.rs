//! User interface components and rendering logic for the dashboard editor.
//!
//! This module contains all the egui code: the main application struct, the
//! toolbar, the widget palette, the properties panel, the message console and
//! the canvas. Editing logic lives in [`crate::session`]; the UI only turns
//! input into session calls and paints the renderer's elements.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main DashboardApp
//! - `file_ops` - File save/load operations and sample loading
//! - `canvas` - Pointer handling and palette drops on the canvas
//! - `rendering` - Drawing the grid, widgets, guides and the trash target
//! - `export` - SVG and PNG export of the layout
//! - `arduino` - Arduino sketch generation for the device side of a dashboard

mod arduino;
mod canvas;
mod export;
mod file_ops;
mod rendering;
mod state;


pub use state::DashboardApp;

use self::state::PendingConfirmAction;
use crate::constants;
use crate::properties::{validate_property, FormField};
use crate::registry::{PropertyKind, TOPIC_KEY};
use crate::render::{parse_hex_color, FALLBACK_COLOR};
use crate::samples::all_samples;
use crate::transport::{Direction, Transport, TransportStatus};
use crate::types::Mode;
use eframe::egui;

impl eframe::App for DashboardApp {
    /// Persist UI settings between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.config = self.session.config().clone();
        match self.to_json() {
            Ok(json) => {
                storage.set_string("app_state", json);
            }
            Err(err) => {
                log::error!("Failed to serialize app state: {err}");
            }
        }
    }

    /// Main update function called by egui for each frame.
    ///
    /// Handles keyboard shortcuts and file results, lays out the panels and
    /// canvas, then moves messages between the session and the transport.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context
    /// * `_frame` - The eframe frame
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme visuals
        let visuals = if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        self.handle_pending_operations(ctx);
        self.handle_focus_loss(ctx);
        self.handle_undo_keys(ctx);
        self.handle_editor_keys(ctx);
        self.handle_file_shortcuts(ctx);

        // Intercept native window close requests (titlebar X)
        if ctx.input(|i| i.viewport().close_requested()) {
            if self.file.has_unsaved_changes && !self.file.allow_close_on_next_request {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                if !self.file.show_unsaved_dialog {
                    self.file.show_unsaved_dialog = true;
                    self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                }
            } else {
                self.file.allow_close_on_next_request = false;
            }
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::SidePanel::left("widget_palette")
            .resizable(false)
            .default_width(140.0)
            .show(ctx, |ui| {
                self.draw_palette(ui);
            });

        let viewport_width = ctx.input(|i| i.screen_rect().width());
        let max_allowed = (viewport_width * 0.9).max(180.0);
        let clamped_width = self.properties_panel_width.clamp(180.0, max_allowed);

        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(clamped_width)
            .show(ctx, |ui| {
                self.properties_panel_width = ui.available_width().clamp(180.0, max_allowed);
                self.draw_properties_panel(ui);
            });

        if self.console.visible {
            egui::TopBottomPanel::bottom("message_console")
                .resizable(true)
                .default_height(180.0)
                .show(ctx, |ui| {
                    self.draw_console(ui);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        self.draw_export_window(ctx);
        self.draw_unsaved_dialog(ctx);

        self.pump_transport(ctx);
        self.refresh_unsaved_flag();
    }
}

impl DashboardApp {
    /// Asks for confirmation first when the action would discard unsaved changes.
    fn request_confirmed(&mut self, ctx: &egui::Context, action: PendingConfirmAction) {
        if self.file.has_unsaved_changes {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(action);
        } else {
            self.run_confirmed_action(ctx, action);
        }
    }

    fn run_confirmed_action(&mut self, ctx: &egui::Context, action: PendingConfirmAction) {
        match action {
            PendingConfirmAction::New => self.new_dashboard(),
            PendingConfirmAction::Open => self.load_dashboard_file(),
            PendingConfirmAction::LoadSample(index) => self.load_sample(index),
            PendingConfirmAction::Quit => {
                // Allow one close request to pass without interception
                self.file.allow_close_on_next_request = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Handles file-related keyboard shortcuts (New/Open/Save/Save As/Quit).
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let mut requested = None;
        ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            if i.key_pressed(egui::Key::S) && cmd && shift {
                self.save_as_dashboard();
            } else if i.key_pressed(egui::Key::S) && cmd {
                self.save_dashboard();
            }
            if i.key_pressed(egui::Key::O) && cmd {
                requested = Some(PendingConfirmAction::Open);
            }
            if i.key_pressed(egui::Key::N) && cmd {
                requested = Some(PendingConfirmAction::New);
            }
            if i.key_pressed(egui::Key::Q) && cmd {
                requested = Some(PendingConfirmAction::Quit);
            }
        });
        if let Some(action) = requested {
            self.request_confirmed(ctx, action);
        }
    }

    /// Handles the undo keyboard shortcut.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for checking input
    fn handle_undo_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift) {
            self.perform_undo();
        }
    }

    /// Handles Delete, Escape and the arrow keys on the canvas.
    ///
    /// Delete removes the selected widget, Escape cancels the active gesture
    /// (or clears the selection when there is none) and the arrow keys nudge
    /// the selection by one cell.
    fn handle_editor_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (delete, escape, dx, dy) = ctx.input(|i| {
            let mut dx = 0;
            let mut dy = 0;
            if i.key_pressed(egui::Key::ArrowLeft) {
                dx -= 1;
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                dx += 1;
            }
            if i.key_pressed(egui::Key::ArrowUp) {
                dy -= 1;
            }
            if i.key_pressed(egui::Key::ArrowDown) {
                dy += 1;
            }
            (
                i.key_pressed(egui::Key::Delete),
                i.key_pressed(egui::Key::Escape),
                dx,
                dy,
            )
        });

        if escape {
            self.canvas.pointer_captured = false;
            if !self.session.cancel_gesture() {
                self.session.select(None);
            }
        }
        if delete && self.session.delete_selected() {
            self.canvas.pointer_captured = false;
        }
        if dx != 0 || dy != 0 {
            self.session.nudge(dx, dy);
        }
    }

    /// Cancels the active gesture when the window loses focus, since the
    /// release event will never arrive.
    fn handle_focus_loss(&mut self, ctx: &egui::Context) {
        let lost_focus = ctx.input(|i| {
            i.events
                .iter()
                .any(|event| matches!(event, egui::Event::WindowFocused(false)))
        });
        if lost_focus {
            self.canvas.pointer_captured = false;
            if self.session.cancel_gesture() {
                log::debug!("gesture cancelled on focus loss");
            }
        }
    }

    /// Performs an undo operation.
    fn perform_undo(&mut self) {
        self.canvas.pointer_captured = false;
        self.session.undo();
    }

    /// Switches between edit and run mode, keeping the transport in step.
    fn set_mode(&mut self, mode: Mode) {
        self.canvas.pointer_captured = false;
        self.session.set_mode(mode);
        if mode == Mode::Edit {
            self.transport.unsubscribe_all();
        }
        self.subscribed_revision = None;
    }

    /// Moves queued publishes to the transport and routes what came back.
    ///
    /// Subscriptions are refreshed whenever the widget list changed while
    /// running.
    fn pump_transport(&mut self, ctx: &egui::Context) {
        let revision = self.session.revision();
        if self.session.mode() == Mode::Run && self.subscribed_revision != Some(revision) {
            self.transport.unsubscribe_all();
            for topic in self.session.subscriptions() {
                self.transport.subscribe(&topic);
            }
            self.subscribed_revision = Some(revision);
        }

        let sent = self.session.flush_outbound(&mut self.transport);
        let received = self.inbound.drain();
        let got_messages = !received.is_empty();
        if got_messages {
            self.session.handle_inbound(received);
        }
        if sent > 0 || got_messages {
            ctx.request_repaint();
        }
    }

    /// Renders the toolbar with file operations, mode switch, samples and view options.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.request_confirmed(&ctx, PendingConfirmAction::New);
            }
            if ui.button("Open").clicked() {
                self.request_confirmed(&ctx, PendingConfirmAction::Open);
            }
            if ui.button("Save").clicked() {
                self.save_dashboard();
            }
            if ui.button("Save As").clicked() {
                self.save_as_dashboard();
            }

            ui.separator();

            ui.add_enabled_ui(self.session.can_undo(), |ui| {
                if ui.button("⟲ Undo").clicked() {
                    self.perform_undo();
                }
            });

            ui.separator();

            let current = self.session.mode();
            let mut mode = current;
            ui.selectable_value(&mut mode, Mode::Edit, "✏ Edit");
            ui.selectable_value(&mut mode, Mode::Run, "▶ Run");
            if mode != current {
                self.set_mode(mode);
            }

            ui.separator();

            let mut chosen_sample = None;
            egui::ComboBox::from_id_salt("samples_combo")
                .selected_text("Samples")
                .show_ui(ui, |ui| {
                    for (index, info) in all_samples().iter().enumerate() {
                        if ui.selectable_label(false, info.name).clicked() {
                            chosen_sample = Some(index);
                        }
                    }
                });
            if let Some(index) = chosen_sample {
                self.request_confirmed(&ctx, PendingConfirmAction::LoadSample(index));
            }

            if ui.button("Export…").clicked() {
                self.export.show_window = true;
            }

            ui.separator();

            ui.checkbox(&mut self.canvas.show_grid, "Show Grid");
            ui.checkbox(&mut self.console.visible, "Console");
            ui.checkbox(&mut self.dark_mode, "Dark Mode");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let status = if self.file.has_unsaved_changes { "*" } else { "" };
                match &self.file.current_path {
                    Some(file_path) => ui.label(format!("{file_path}{status}")),
                    None => ui.label(format!("Untitled{status}")),
                };
                if let Some(error) = &self.file.last_error {
                    ui.colored_label(egui::Color32::from_rgb(230, 80, 80), error);
                }
                let status = self.transport.status();
                let color = match status {
                    TransportStatus::Connected => egui::Color32::from_rgb(76, 175, 80),
                    TransportStatus::Disconnected => egui::Color32::GRAY,
                    TransportStatus::Failed(_) => egui::Color32::from_rgb(230, 80, 80),
                };
                ui.colored_label(color, format!("● {}", status.label()));
            });
        });
    }

    /// Renders the widget palette: click to add at the default cell, drag to
    /// drop at a chosen cell.
    fn draw_palette(&mut self, ui: &mut egui::Ui) {
        ui.heading("Widgets");
        ui.separator();
        let editing = self.session.mode() == Mode::Edit;
        let types = self.session.registry().list_types();
        ui.add_enabled_ui(editing, |ui| {
            for type_tag in types {
                let response = ui
                    .add(
                        egui::Button::new(type_tag.tag())
                            .min_size(egui::vec2(ui.available_width(), 24.0))
                            .sense(egui::Sense::click_and_drag()),
                    )
                    .on_hover_text("Click to add, or drag onto the canvas");
                if response.drag_started() {
                    egui::DragAndDrop::set_payload(ui.ctx(), type_tag);
                }
                if response.dragged() {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
                }
                if response.clicked() {
                    let (x, y) = constants::DEFAULT_PLACEMENT_CELL;
                    self.session.place_widget(type_tag, x, y);
                }
            }
        });
        if !editing {
            ui.separator();
            ui.label("Switch to Edit to add widgets.");
        }
    }

    /// Renders the properties panel for the selected widget, or the project
    /// settings when nothing is selected.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Properties");
            ui.separator();

            let Some(form) = self.session.properties().form().cloned() else {
                self.draw_project_settings(ui);
                return;
            };
            if let Some(widget) = self.session.scene().get(form.widget_id) {
                ui.label(format!(
                    "{} at ({}, {}), {}×{} cells",
                    widget.type_tag, widget.position.0, widget.position.1, widget.size.0, widget.size.1
                ));
                ui.separator();
            }

            for field in &form.fields {
                self.draw_form_field(ui, field);
                ui.add_space(4.0);
            }

            ui.separator();
            if ui.button("🗑 Delete widget").clicked() {
                self.session.delete_widget(form.widget_id);
            }
        });
    }

    /// Draws one property row. Text is committed on Enter or when the field
    /// loses focus; choices and colour picks commit immediately.
    fn draw_form_field(&mut self, ui: &mut egui::Ui, field: &FormField) {
        ui.label(field.caption);
        match field.kind {
            PropertyKind::Choice(options) => {
                let mut selected = field.value.clone();
                egui::ComboBox::from_id_salt(("property_choice", field.key))
                    .selected_text(selected.clone())
                    .show_ui(ui, |ui| {
                        for option in options {
                            ui.selectable_value(&mut selected, option.to_string(), *option);
                        }
                    });
                if selected != field.value {
                    self.session.set_property_draft(field.key, &selected);
                    self.commit_field(field.key);
                }
            }
            PropertyKind::Color => {
                ui.horizontal(|ui| {
                    let mut rgb = parse_hex_color(&field.value).unwrap_or(FALLBACK_COLOR);
                    if ui.color_edit_button_srgb(&mut rgb).changed() {
                        let [r, g, b] = rgb;
                        self.session
                            .set_property_draft(field.key, &format!("#{r:02X}{g:02X}{b:02X}"));
                        self.commit_field(field.key);
                    }
                    self.draw_draft_editor(ui, field);
                });
            }
            _ => self.draw_draft_editor(ui, field),
        }
        if let Some(error) = &field.error {
            ui.colored_label(egui::Color32::from_rgb(230, 80, 80), error.to_string());
        }
    }

    fn draw_draft_editor(&mut self, ui: &mut egui::Ui, field: &FormField) {
        let mut text = field.draft.clone();
        let response = ui.add(
            egui::TextEdit::singleline(&mut text)
                .id_salt(("property_text", field.key))
                .desired_width(f32::INFINITY),
        );
        if response.changed() {
            self.session.set_property_draft(field.key, &text);
        }
        if response.lost_focus() {
            self.commit_field(field.key);
        }
    }

    fn commit_field(&mut self, key: &str) {
        if let Ok(true) = self.session.commit_property_edit(key) {
            log::debug!("property {key} updated");
        }
    }

    /// Project settings shown while no widget is selected. These edits are
    /// not part of the undo history.
    fn draw_project_settings(&mut self, ui: &mut egui::Ui) {
        ui.label("No widget selected");
        ui.add_space(8.0);
        ui.strong("Project");

        let mut project = self.session.project().clone();
        let mut changed = false;
        egui::Grid::new("project_settings")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("Name");
                changed |= ui.text_edit_singleline(&mut project.name).changed();
                ui.end_row();
                ui.label("Broker");
                changed |= ui.text_edit_singleline(&mut project.broker).changed();
                ui.end_row();
                ui.label("Port");
                changed |= ui.add(egui::DragValue::new(&mut project.port)).changed();
                ui.end_row();
                ui.label("Client id");
                changed |= ui.text_edit_singleline(&mut project.client_id).changed();
                ui.end_row();
                ui.label("Base topic");
                changed |= ui.text_edit_singleline(&mut project.base_topic).changed();
                ui.end_row();
            });

        match validate_property(None, TOPIC_KEY, &project.base_topic) {
            Ok(base_topic) => {
                if changed {
                    project.base_topic = base_topic;
                    self.session.set_project(project);
                    self.file.has_unsaved_changes = true;
                }
            }
            Err(err) => {
                ui.colored_label(egui::Color32::from_rgb(230, 80, 80), err.to_string());
            }
        }

        ui.add_space(8.0);
        ui.label(format!("{} widgets", self.session.scene().widgets().len()));
    }

    /// Renders the message console: the log plus a manual publish box.
    fn draw_console(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.strong("Messages");
            ui.separator();
            let connected = self.transport.status() == TransportStatus::Connected;
            if connected {
                if ui.button("Disconnect").clicked() {
                    self.transport.disconnect();
                    self.subscribed_revision = None;
                }
            } else if ui.button("Connect").clicked() {
                self.transport.connect();
                self.subscribed_revision = None;
            }
            if ui.button("Clear").clicked() {
                self.session.clear_message_log();
            }
            ui.label(format!(
                "{} subscriptions, {} published",
                self.transport.subscriptions().len(),
                self.transport.published()
            ));
        });
        ui.separator();

        let mut publish = false;
        ui.horizontal(|ui| {
            ui.label("Topic");
            ui.add(egui::TextEdit::singleline(&mut self.console.topic_input).desired_width(200.0));
            ui.label("Payload");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.console.payload_input).desired_width(160.0),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                publish = true;
            }
            if ui.button("Publish").clicked() {
                publish = true;
            }
            if let Some(status) = &self.console.status {
                ui.colored_label(egui::Color32::from_rgb(230, 80, 80), status);
            }
        });
        if publish {
            if self
                .session
                .publish_manual(&self.console.topic_input, &self.console.payload_input)
            {
                self.console.status = None;
            } else {
                self.console.status = Some("Enter a topic without + or # wildcards".to_string());
            }
        }

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in self.session.message_log().entries() {
                    let arrow = match entry.direction {
                        Direction::Outbound => "→",
                        Direction::Inbound => "←",
                    };
                    ui.monospace(format!(
                        "{:>5} {arrow} {}  {}",
                        entry.seq, entry.topic, entry.payload
                    ));
                }
            });
    }

    /// Renders the export options window.
    fn draw_export_window(&mut self, ctx: &egui::Context) {
        if !self.export.show_window {
            return;
        }
        let mut open = true;
        let mut export_svg = false;
        let mut export_png = false;
        let mut export_arduino = false;
        let mut copy_arduino = false;
        let options = &mut self.export;
        egui::Window::new("Export Layout")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("export_options")
                    .num_columns(2)
                    .show(ui, |ui| {
                        ui.label("Margin (px)");
                        ui.add(egui::DragValue::new(&mut options.margin_px).range(0.0..=200.0));
                        ui.end_row();
                        ui.label("PNG scale");
                        ui.add(
                            egui::DragValue::new(&mut options.png_scale)
                                .range(0.25..=8.0)
                                .speed(0.05),
                        );
                        ui.end_row();
                        ui.checkbox(&mut options.include_background, "Background");
                        ui.color_edit_button_srgb(&mut options.background_color);
                        ui.end_row();
                        ui.checkbox(&mut options.include_labels, "Labels");
                        ui.checkbox(&mut options.include_grid, "Grid");
                        ui.end_row();
                    });
                ui.separator();
                ui.horizontal(|ui| {
                    export_svg = ui.button("Export SVG…").clicked();
                    export_png = ui.button("Export PNG…").clicked();
                });
                ui.separator();
                ui.label("Device firmware");
                ui.horizontal(|ui| {
                    export_arduino = ui.button("Export Arduino…").clicked();
                    copy_arduino = ui.button("Copy sketch").clicked();
                });
            });
        self.export.show_window = open;
        if export_arduino {
            self.export_arduino(ctx);
        }
        if copy_arduino {
            self.copy_arduino_sketch(ctx);
        }
        if export_svg {
            self.export_svg(ctx);
        }
        if export_png {
            self.export_png(ctx);
        }
    }

    /// Renders the unsaved-changes confirmation dialog when requested.
    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        if !self.file.show_unsaved_dialog {
            return;
        }
        let action = self.file.pending_confirm_action;
        let (title, confirm_label) = match action {
            Some(PendingConfirmAction::Quit) => ("Unsaved changes: Quit?", "Discard and Quit"),
            Some(PendingConfirmAction::New) => ("Unsaved changes: Create New?", "Discard and Create New"),
            Some(PendingConfirmAction::Open) => ("Unsaved changes: Open File?", "Discard and Open"),
            Some(PendingConfirmAction::LoadSample(_)) => {
                ("Unsaved changes: Load Sample?", "Discard and Load Sample")
            }
            None => ("Unsaved changes", "Discard"),
        };
        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    confirmed = ui.button(confirm_label).clicked();
                    cancelled = ui.button("Cancel").clicked();
                });
            });
        if confirmed || cancelled {
            self.file.show_unsaved_dialog = false;
            self.file.pending_confirm_action = None;
        }
        if confirmed {
            if let Some(action) = action {
                self.run_confirmed_action(ctx, action);
            }
        }
    }
}
