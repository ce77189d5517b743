//! Editor tunables.
//!
//! Defaults come from [`crate::constants`]; the UI persists the struct as part of
//! its saved state so users keep their preferences across restarts.

use crate::constants;
use serde::{Deserialize, Serialize};

/// Tunable parameters for an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Size of one grid cell in pixels; pointer deltas are divided by this
    pub cell_px: f32,
    /// Pointer distance from the trash center (in pixels) that arms deletion
    pub trash_radius_px: f32,
    /// Maximum number of undo snapshots
    pub history_capacity: usize,
    /// Alignment threshold in cells
    pub align_threshold: f32,
    /// Size of the resize handle hit area in pixels
    pub resize_handle_px: f32,
    /// Base topic used for generated widget topics
    pub base_topic: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            cell_px: constants::GRID_CELL_PX,
            trash_radius_px: constants::TRASH_RADIUS_PX,
            history_capacity: constants::MAX_UNDO_HISTORY,
            align_threshold: constants::ALIGN_THRESHOLD_CELLS,
            resize_handle_px: constants::RESIZE_HANDLE_PX,
            base_topic: constants::DEFAULT_BASE_TOPIC.to_string(),
        }
    }
}

impl EditorConfig {
    /// Converts a pixel delta into a whole number of cells (`round(px / cell)`).
    pub fn cells_from_pixels(&self, delta_px: f32) -> i64 {
        if self.cell_px <= 0.0 {
            return 0;
        }
        (delta_px / self.cell_px).round() as i64
    }

    /// Index of the cell containing a pixel coordinate, clamped to the grid
    /// origin.
    pub fn cell_at(&self, px: f32) -> u32 {
        if self.cell_px <= 0.0 {
            return 0;
        }
        (px / self.cell_px).floor().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_deltas_round_to_nearest_cell() {
        let config = EditorConfig::default();
        assert_eq!(config.cells_from_pixels(0.0), 0);
        assert_eq!(config.cells_from_pixels(9.0), 0);
        assert_eq!(config.cells_from_pixels(11.0), 1);
        assert_eq!(config.cells_from_pixels(-31.0), -2);
    }

    #[test]
    fn pixel_positions_map_to_containing_cell() {
        let config = EditorConfig::default();
        assert_eq!(config.cell_at(-40.0), 0);
        assert_eq!(config.cell_at(0.0), 0);
        assert_eq!(config.cell_at(19.9), 0);
        assert_eq!(config.cell_at(39.0), 1);
        assert_eq!(config.cell_at(40.0), 2);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"cell_px": 10.0}"#).unwrap();
        assert_eq!(config.cell_px, 10.0);
        assert_eq!(config.history_capacity, constants::MAX_UNDO_HISTORY);
        assert_eq!(config.base_topic, constants::DEFAULT_BASE_TOPIC);
    }
}
