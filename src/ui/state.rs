//! Application state management structures.
//!
//! This module contains the state structures that track the application's
//! current UI state: canvas display options, the message console, export
//! options and file operations. The dashboard itself lives in the
//! [`EditorSession`].

use crate::config::EditorConfig;
use crate::session::EditorSession;
use crate::transport::{LoopbackTransport, MessageQueue};
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};

/// State related to canvas display.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Whether the dot grid should be displayed on the canvas
    pub show_grid: bool,
    /// Screen rectangle of the canvas in the last frame
    #[serde(skip)]
    pub last_rect: Option<egui::Rect>,
    /// A primary press started on the canvas and has not been released yet
    #[serde(skip)]
    pub pointer_captured: bool,
    /// Last pointer position forwarded to the session (canvas pixels)
    #[serde(skip)]
    pub last_pointer: Option<(f32, f32)>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            show_grid: true,
            last_rect: None,
            pointer_captured: false,
            last_pointer: None,
        }
    }
}

/// State of the bottom message console.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleState {
    /// Whether the console panel is shown
    pub visible: bool,
    /// Topic typed into the manual publish box
    pub topic_input: String,
    /// Payload typed into the manual publish box
    #[serde(skip)]
    pub payload_input: String,
    /// Feedback for the last manual publish
    #[serde(skip)]
    pub status: Option<String>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            visible: true,
            topic_input: String::new(),
            payload_input: String::new(),
            status: None,
        }
    }
}

/// Options controlling SVG and PNG export of the dashboard layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Empty border around the widgets, in pixels
    pub margin_px: f32,
    /// Raster scale applied when exporting PNG
    pub png_scale: f32,
    /// Fill the image with `background_color`
    pub include_background: bool,
    /// Background colour as sRGB
    pub background_color: [u8; 3],
    /// Draw widget labels
    pub include_labels: bool,
    /// Draw the dot grid
    pub include_grid: bool,
    /// Whether the export window is open
    #[serde(skip)]
    pub show_window: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            margin_px: 20.0,
            png_scale: 2.0,
            include_background: true,
            background_color: [0xFA, 0xFA, 0xFA],
            include_labels: true,
            include_grid: false,
            show_window: false,
        }
    }
}

/// State related to file operations and persistence.
///
/// Manages file paths, unsaved changes tracking, and async file operations.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FileState {
    /// Current file path for save/load operations
    #[serde(skip)]
    pub current_path: Option<String>,
    /// Flag indicating if the dashboard has unsaved changes
    #[serde(skip)]
    pub has_unsaved_changes: bool,
    /// Scene revision at the last save, load or reset
    #[serde(skip)]
    pub saved_revision: u64,
    /// Pending file operations, started on the next frame
    #[serde(skip)]
    pub pending_save_operation: Option<PendingSaveOperation>,
    #[serde(skip)]
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Channel for receiving file operation results from async contexts
    #[serde(skip)]
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    #[serde(skip)]
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
    /// Whether to show an unsaved-changes confirmation dialog
    #[serde(skip)]
    pub show_unsaved_dialog: bool,
    /// The action the user attempted that requires confirmation (e.g., New or Quit)
    #[serde(skip)]
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// One-shot flag to allow the next close request to proceed after user confirmation
    #[serde(skip)]
    pub allow_close_on_next_request: bool,
    /// Last file error, shown in the toolbar until the next successful operation
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            has_unsaved_changes: false,
            saved_revision: 0,
            pending_save_operation: None,
            pending_load_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
            last_error: None,
        }
    }
}

/// Represents a pending save operation type.
#[derive(Debug)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker)
    SaveAs,
    /// Save to the existing file path
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug)]
pub enum PendingLoadOperation {
    /// Load from a file (show file picker)
    Load,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path
    SaveCompleted(String),
    /// Load operation completed successfully with path and content
    LoadCompleted(String, String),
    /// Export finished writing the given path
    ExportCompleted(String),
    /// Operation failed with an error message
    OperationFailed(String),
}

/// Pending confirmation actions that may require user approval due to unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// User is attempting to create a new dashboard
    New,
    /// User is attempting to open a file
    Open,
    /// User is attempting to replace the dashboard with a sample
    LoadSample(usize),
    /// User is attempting to quit the application
    Quit,
}

/// The main application structure: the editing session plus UI state.
///
/// This struct implements the `eframe::App` trait and handles all user interface
/// rendering and interaction logic. Only UI preferences are persisted between
/// restarts; the open dashboard is saved explicitly to a file.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardApp {
    /// The dashboard being edited or run
    #[serde(skip)]
    pub session: EditorSession,
    /// Editor tunables, applied to the session on startup
    pub config: EditorConfig,
    /// Canvas display state
    pub canvas: CanvasState,
    /// Message console state
    pub console: ConsoleState,
    /// Export options
    pub export: ExportOptions,
    /// File operations state
    pub file: FileState,
    /// Queue the transport delivers inbound messages into
    #[serde(skip)]
    pub inbound: MessageQueue,
    /// In-process transport used while running
    #[serde(skip)]
    pub transport: LoopbackTransport,
    /// Scene revision the transport subscriptions were computed for
    #[serde(skip)]
    pub subscribed_revision: Option<u64>,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Remembered width of the properties panel across sessions
    pub properties_panel_width: f32,
}

impl Default for DashboardApp {
    fn default() -> Self {
        let config = EditorConfig::default();
        let inbound = MessageQueue::new();
        let mut transport = LoopbackTransport::new(inbound.sender());
        transport.connect();
        Self {
            session: EditorSession::new(config.clone()),
            config,
            canvas: CanvasState::default(),
            console: ConsoleState::default(),
            export: ExportOptions::default(),
            file: FileState::default(),
            inbound,
            transport,
            subscribed_revision: None,
            dark_mode: true,
            properties_panel_width: 300.0,
        }
    }
}

impl DashboardApp {
    /// Creates the app, restoring UI settings saved by a previous run.
    ///
    /// # Arguments
    ///
    /// * `cc` - The eframe creation context providing persistent storage
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let restored = cc
            .storage
            .and_then(|storage| storage.get_string("app_state"))
            .and_then(|json| match Self::from_json(&json) {
                Ok(app) => Some(app),
                Err(err) => {
                    log::warn!("ignoring unreadable saved app state: {err}");
                    None
                }
            });
        let mut app = restored.unwrap_or_default();
        app.session.set_config(app.config.clone());
        let project = crate::types::ProjectSettings {
            base_topic: app.config.base_topic.clone(),
            ..app.session.project().clone()
        };
        app.session.set_project(project);
        app
    }

    /// Serializes the application state to JSON.
    ///
    /// # Returns
    ///
    /// A JSON string representation of the UI settings, or an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes application state from JSON.
    ///
    /// # Arguments
    ///
    /// * `json` - JSON string containing the serialized app state
    ///
    /// # Returns
    ///
    /// A `DashboardApp` instance, or an error if deserialization fails.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Recomputes the unsaved-changes flag from the scene revision.
    pub fn refresh_unsaved_flag(&mut self) {
        if self.session.revision() != self.file.saved_revision {
            self.file.has_unsaved_changes = true;
        }
    }

    /// Records the current scene as matching what is on disk.
    pub fn mark_saved(&mut self) {
        self.file.saved_revision = self.session.revision();
        self.file.has_unsaved_changes = false;
    }
}
