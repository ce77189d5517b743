//! Error types surfaced by the editor.
//!
//! Editor operations on missing widgets are silent no-ops and never produce an
//! error; only rejected user input and persistence failures are reported.

use thiserror::Error;

/// A property edit that was rejected by the properties binder.
///
/// The widget keeps its previous value and no undo snapshot is taken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The value does not parse as a number
    #[error("`{key}` expects a number, got `{value}`")]
    NotANumber {
        /// Property key
        key: String,
        /// Rejected text
        value: String,
    },
    /// The number lies outside the allowed bounds
    #[error("`{key}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Property key
        key: String,
        /// Rejected number
        value: f64,
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Not a `#RRGGBB` colour
    #[error("`{key}` expects a colour like #RRGGBB, got `{value}`")]
    InvalidColor {
        /// Property key
        key: String,
        /// Rejected text
        value: String,
    },
    /// Not one of the allowed choices
    #[error("`{key}` must be one of {options:?}, got `{value}`")]
    InvalidChoice {
        /// Property key
        key: String,
        /// Rejected text
        value: String,
        /// Accepted values
        options: Vec<String>,
    },
    /// A required value was left empty
    #[error("`{0}` must not be empty")]
    Empty(String),
    /// Widget topics are publish targets and cannot hold wildcards
    #[error("topic `{0}` must not contain the wildcards `+` or `#`")]
    WildcardTopic(String),
}

/// Failure while saving or loading a dashboard file.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The file is not a valid dashboard document
    #[error("invalid dashboard JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Reading or writing the file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Written by a newer version of the editor
    #[error("unsupported dashboard format version {0}")]
    UnsupportedVersion(u32),
}

/// Failure while rasterizing the layout export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The generated SVG was rejected by the parser
    #[error("generated SVG could not be parsed: {0}")]
    Svg(#[from] usvg::Error),
    /// The raster size is zero or too large
    #[error("cannot allocate a {width}x{height} image")]
    Pixmap {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
    /// The PNG encoder failed
    #[error("PNG encoding failed: {0}")]
    Png(String),
}
