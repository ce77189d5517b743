//! Core data types and structures for the dashboard editor.
//!
//! This module defines the fundamental records used throughout the application:
//! widget instances, their type tags, the editor mode and the saved dashboard
//! document.

use crate::constants;
use crate::error::PersistError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for placed widgets.
pub type WidgetId = Uuid;

/// The closed set of widget kinds the editor knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetType {
    /// Momentary push button that publishes on press
    Button,
    /// Two-state toggle
    Switch,
    /// Indicator lamp driven by on/off payloads
    Led,
    /// Displays the last received payload
    Text,
    /// Numeric input with min/max/step
    Slider,
    /// Shows an image source that can be swapped at runtime
    Image,
    /// Camera feed placeholder counting received frames
    Camera,
    /// Numeric gauge for temperatures
    Thermometer,
}

impl WidgetType {
    /// Every widget type, in palette order.
    pub const ALL: [WidgetType; 8] = [
        WidgetType::Button,
        WidgetType::Switch,
        WidgetType::Led,
        WidgetType::Text,
        WidgetType::Slider,
        WidgetType::Image,
        WidgetType::Camera,
        WidgetType::Thermometer,
    ];

    /// The upper-case tag used in labels and saved files (e.g. `"BUTTON"`).
    pub const fn tag(self) -> &'static str {
        match self {
            WidgetType::Button => "BUTTON",
            WidgetType::Switch => "SWITCH",
            WidgetType::Led => "LED",
            WidgetType::Text => "TEXT",
            WidgetType::Slider => "SLIDER",
            WidgetType::Image => "IMAGE",
            WidgetType::Camera => "CAMERA",
            WidgetType::Thermometer => "THERMOMETER",
        }
    }

    /// Parses a tag case-insensitively. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|ty| ty.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Whether the canvas is being laid out or is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Widgets can be dragged, resized, configured and deleted
    #[default]
    Edit,
    /// Widgets publish and react to transport messages
    Run,
}

/// A widget placed on the dashboard grid.
///
/// Geometry is expressed in grid cells, never in pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    /// Stable identifier, never reused within a scene
    pub id: WidgetId,
    /// The widget kind
    pub type_tag: WidgetType,
    /// 1-based index unique among widgets of the same type
    pub type_local_index: u32,
    /// Top-left cell as (x, y)
    pub position: (u32, u32),
    /// Size in cells as (width, height)
    pub size: (u32, u32),
    /// Display caption
    pub label: String,
    /// Transport binding; empty means unbound
    #[serde(default)]
    pub topic: String,
    /// Type-specific settings such as colour or payload text
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Widget {
    /// X coordinate one past the right edge, in cells. Saturates at the
    /// grid edge.
    pub fn right(&self) -> u32 {
        self.position.0.saturating_add(self.size.0)
    }

    /// Y coordinate one past the bottom edge, in cells. Saturates at the
    /// grid edge.
    pub fn bottom(&self) -> u32 {
        self.position.1.saturating_add(self.size.1)
    }

    /// Horizontal center in cells (may be fractional).
    pub fn center_x(&self) -> f32 {
        self.position.0 as f32 + self.size.0 as f32 / 2.0
    }

    /// Vertical center in cells (may be fractional).
    pub fn center_y(&self) -> f32 {
        self.position.1 as f32 + self.size.1 as f32 / 2.0
    }

    /// Returns a property value, or the empty string when unset.
    pub fn property(&self, key: &str) -> &str {
        self.properties.get(key).map(String::as_str).unwrap_or("")
    }

    /// Returns `true` when the cell point lies inside the widget.
    pub fn contains_cell(&self, x: f32, y: f32) -> bool {
        x >= self.position.0 as f32
            && x < self.right() as f32
            && y >= self.position.1 as f32
            && y < self.bottom() as f32
    }
}

/// Connection and topic settings for a dashboard project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Display name
    pub name: String,
    /// Broker host name
    pub broker: String,
    /// Broker port
    pub port: u16,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Prefix for generated widget topics
    pub base_topic: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: "Untitled dashboard".to_string(),
            broker: constants::DEFAULT_BROKER.to_string(),
            port: constants::DEFAULT_PORT,
            client_id: String::new(),
            base_topic: constants::DEFAULT_BASE_TOPIC.to_string(),
        }
    }
}

/// A saved dashboard: project settings plus the ordered widget list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// File format version
    pub version: u32,
    /// Project settings
    #[serde(default)]
    pub project: ProjectSettings,
    /// Widgets in z-order
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            version: constants::DASHBOARD_FORMAT_VERSION,
            project: ProjectSettings::default(),
            widgets: Vec::new(),
        }
    }
}

/// Loosely typed form of [`Dashboard`] so one bad widget record does not
/// reject the whole file.
#[derive(Deserialize)]
struct RawDashboard {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    project: ProjectSettings,
    #[serde(default)]
    widgets: Vec<serde_json::Value>,
}

fn default_version() -> u32 {
    constants::DASHBOARD_FORMAT_VERSION
}

impl Dashboard {
    /// Creates an empty dashboard with default project settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the dashboard to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a dashboard from a JSON string.
    ///
    /// Widget records that cannot be decoded (for example because of an unknown
    /// type tag) are skipped with a warning. Duplicate ids are replaced with
    /// fresh ones so id uniqueness holds for the loaded scene.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Json`] when the document itself is malformed and
    /// [`PersistError::UnsupportedVersion`] for files written by a newer format.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let raw: RawDashboard = serde_json::from_str(json)?;
        if raw.version > constants::DASHBOARD_FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(raw.version));
        }

        let mut seen = HashSet::new();
        let mut widgets = Vec::with_capacity(raw.widgets.len());
        for value in raw.widgets {
            match serde_json::from_value::<Widget>(value) {
                Ok(mut widget) => {
                    if !seen.insert(widget.id) {
                        let fresh = Uuid::new_v4();
                        log::warn!("duplicate widget id {} reassigned to {}", widget.id, fresh);
                        widget.id = fresh;
                        seen.insert(fresh);
                    }
                    widgets.push(widget);
                }
                Err(err) => log::warn!("skipping unreadable widget record: {err}"),
            }
        }

        Ok(Self {
            version: constants::DASHBOARD_FORMAT_VERSION,
            project: raw.project,
            widgets,
        })
    }

    /// Writes the dashboard to `path` as pretty JSON.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), PersistError> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reads a dashboard from `path`.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, PersistError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
