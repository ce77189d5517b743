//! # Panel Craft
//!
//! A visual editor for MQTT dashboards. Widgets are placed on a cell grid,
//! dragged, resized and configured in edit mode, then exercised in run mode
//! where they publish and react to messages through a transport.
//!
//! ## Features
//! - Widget registry with eight built-in types (button, switch, LED, text,
//!   slider, image, camera, thermometer)
//! - Drag and resize with alignment guides and a trash target
//! - Undo history of the last 20 edits (no redo)
//! - Properties panel with per-type validation
//! - Loopback transport and message console for trying a dashboard offline
//! - JSON save/load, sample dashboards and SVG/PNG layout export

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod layout;
pub mod properties;
pub mod registry;
pub mod render;
pub mod samples;
pub mod scene;
pub mod session;
pub mod transport;
pub mod types;
pub mod widgets;
mod ui;

// Re-export the types most callers need
pub use config::EditorConfig;
pub use registry::WidgetRegistry;
pub use session::EditorSession;
pub use types::{Dashboard, Mode, Widget, WidgetId, WidgetType};
use ui::DashboardApp;

/// Runs the dashboard editor with default window settings.
///
/// This function initializes the egui application window and starts the main event loop.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an `eframe::Error` if
/// initialization fails.
///
/// # Example
///
/// ```no_run
/// use panel_craft::run_app;
///
/// #[tokio::main]
/// async fn main() -> Result<(), eframe::Error> {
///     run_app()
/// }
/// ```
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Panel Craft",
        options,
        Box::new(|cc| Ok(Box::new(DashboardApp::new(cc)))),
    )
}
