//! File operations for saving and loading dashboards.
//!
//! Native file dialogs run on tokio tasks through `rfd`; their results come
//! back over the [`FileOperationResult`] channel and are applied on the UI
//! thread at the start of the next frame.

use super::state::{
    DashboardApp, FileOperationResult, PendingLoadOperation, PendingSaveOperation,
};
use crate::samples::{all_samples, build_sample};
use crate::types::Dashboard;
use eframe::egui;

impl DashboardApp {
    /// Handles pending file operations.
    ///
    /// This method applies completed async file operations and starts the ones
    /// requested since the last frame.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for requesting repaints
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        let mut results = Vec::new();
        if let Some(receiver) = &self.file.file_operation_receiver {
            results.extend(receiver.try_iter());
        }
        for result in results {
            self.apply_file_result(result);
        }

        if let Some(save_op) = self.file.pending_save_operation.take() {
            self.start_save(ctx, save_op);
        }

        if let Some(PendingLoadOperation::Load) = self.file.pending_load_operation.take() {
            self.start_load(ctx);
        }
    }

    /// Applies one finished file operation to the app.
    pub fn apply_file_result(&mut self, result: FileOperationResult) {
        match result {
            FileOperationResult::SaveCompleted(path) => {
                log::info!("saved dashboard to {path}");
                self.file.current_path = Some(path);
                self.file.last_error = None;
                self.mark_saved();
            }
            FileOperationResult::LoadCompleted(path, content) => match Dashboard::from_json(&content) {
                Ok(dashboard) => {
                    self.session.load_dashboard(dashboard);
                    self.file.current_path = Some(path);
                    self.file.last_error = None;
                    self.canvas.pointer_captured = false;
                    self.subscribed_revision = None;
                    self.mark_saved();
                }
                Err(err) => {
                    log::warn!("failed to load {path}: {err}");
                    self.file.last_error = Some(format!("Could not open {path}: {err}"));
                }
            },
            FileOperationResult::ExportCompleted(path) => {
                log::info!("exported layout to {path}");
                self.file.last_error = None;
            }
            FileOperationResult::OperationFailed(error) => {
                log::error!("file operation failed: {error}");
                self.file.last_error = Some(error);
            }
        }
    }

    fn start_save(&mut self, ctx: &egui::Context, save_op: PendingSaveOperation) {
        let json = match self.session.to_dashboard().to_json() {
            Ok(json) => json,
            Err(err) => {
                self.apply_file_result(FileOperationResult::OperationFailed(format!(
                    "Failed to serialize dashboard: {err}"
                )));
                return;
            }
        };
        let sender = self.file.file_operation_sender.clone();
        let ctx = ctx.clone();

        match (save_op, self.file.current_path.clone()) {
            (PendingSaveOperation::Save, Some(path)) => {
                tokio::spawn(async move {
                    let result = match std::fs::write(&path, json) {
                        Ok(()) => FileOperationResult::SaveCompleted(path),
                        Err(e) => FileOperationResult::OperationFailed(format!(
                            "Failed to save file: {e}"
                        )),
                    };
                    if let Some(tx) = sender {
                        let _ = tx.send(result);
                    }
                    ctx.request_repaint();
                });
            }
            _ => {
                let file_name = format!("{}.json", file_stem(&self.session.project().name));
                tokio::spawn(async move {
                    if let Some(handle) = rfd::AsyncFileDialog::new()
                        .add_filter("Dashboard", &["json"])
                        .set_file_name(file_name)
                        .save_file()
                        .await
                    {
                        let path = handle.path();
                        let result = match std::fs::write(path, json) {
                            Ok(()) => FileOperationResult::SaveCompleted(path.display().to_string()),
                            Err(e) => FileOperationResult::OperationFailed(format!(
                                "Failed to save file: {e}"
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
    }

    fn start_load(&mut self, ctx: &egui::Context) {
        let sender = self.file.file_operation_sender.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Some(handle) = rfd::AsyncFileDialog::new()
                .add_filter("Dashboard", &["json"])
                .pick_file()
                .await
            {
                let path = handle.path();
                let result = match std::fs::read_to_string(path) {
                    Ok(json) => FileOperationResult::LoadCompleted(path.display().to_string(), json),
                    Err(e) => FileOperationResult::OperationFailed(format!(
                        "Failed to read file: {e}"
                    )),
                };
                if let Some(tx) = sender {
                    let _ = tx.send(result);
                }
            }
            ctx.request_repaint();
        });
    }

    /// Opens a file dialog to save the dashboard with a new name.
    pub fn save_as_dashboard(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves the dashboard to the current file path, or triggers "Save As" if no path is set.
    pub fn save_dashboard(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_dashboard();
        }
    }

    /// Opens a file dialog to load a dashboard from disk.
    pub fn load_dashboard_file(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Replaces the open dashboard with an empty one.
    pub fn new_dashboard(&mut self) {
        let project = crate::types::ProjectSettings {
            base_topic: self.session.config().base_topic.clone(),
            ..Default::default()
        };
        self.session.load_dashboard(Dashboard {
            project,
            ..Dashboard::new()
        });
        self.file.current_path = None;
        self.file.last_error = None;
        self.canvas.pointer_captured = false;
        self.subscribed_revision = None;
        self.mark_saved();
    }

    /// Replaces the open dashboard with a built-in sample.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the sample in [`all_samples`]
    pub fn load_sample(&mut self, index: usize) {
        let Some(info) = all_samples().get(index) else {
            return;
        };
        self.session.load_dashboard(build_sample(info.kind));
        self.file.current_path = None;
        self.file.last_error = None;
        self.canvas.pointer_captured = false;
        self.subscribed_revision = None;
        self.mark_saved();
    }
}

/// File name stem derived from a project name.
pub(super) fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "dashboard".to_string()
    } else {
        stem.to_string()
    }
}
