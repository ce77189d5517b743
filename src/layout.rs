//! Layout engine: gesture state, alignment snapping, trash detection and hit
//! testing.
//!
//! Everything here works in grid cells except where a pointer position is
//! involved; pointer deltas are converted with [`EditorConfig::cells_from_pixels`]
//! before they touch widget geometry.

use crate::config::EditorConfig;
use crate::types::{Widget, WidgetId};

/// Alignment guides to draw, in cell coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Guides {
    /// X of a vertical guide line
    pub vertical: Option<f32>,
    /// Y of a horizontal guide line
    pub horizontal: Option<f32>,
}

impl Guides {
    /// Returns `true` when no guide is visible.
    pub fn is_empty(&self) -> bool {
        self.vertical.is_none() && self.horizontal.is_none()
    }
}

/// Outcome of snapping a candidate position against the other widgets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// Final top-left cell, clamped to be non-negative
    pub position: (u32, u32),
    /// Guides produced by the first matching neighbour on each axis
    pub guides: Guides,
}

/// Snaps a dragged widget's candidate position against its neighbours.
///
/// Neighbours are scanned in scene order and the first one that matches wins
/// on each axis independently. On X a neighbour is checked for center
/// alignment (guide only, no snap), then left-edge alignment, then this
/// widget's right edge against the neighbour's left edge. On Y only top edges
/// are compared.
///
/// # Arguments
///
/// * `widgets` - All widgets in the scene, in z-order
/// * `moving` - The dragged widget, excluded from the scan
/// * `candidate` - Unsnapped top-left cell (may be negative)
/// * `size` - The dragged widget's size in cells
/// * `threshold` - Maximum distance in cells that counts as aligned
pub fn snap_to_neighbors(
    widgets: &[Widget],
    moving: WidgetId,
    candidate: (i64, i64),
    size: (u32, u32),
    threshold: f32,
) -> SnapResult {
    let (mut x, mut y) = candidate;
    let width = i64::from(size.0);
    let mut guides = Guides::default();

    for other in widgets.iter().filter(|w| w.id != moving) {
        let other_x = i64::from(other.position.0);
        let center = x as f32 + width as f32 / 2.0;
        if (center - other.center_x()).abs() < threshold {
            guides.vertical = Some(other.center_x());
        } else if ((x - other_x) as f32).abs() < threshold {
            x = other_x;
            guides.vertical = Some(other_x as f32);
        } else if ((x + width - other_x) as f32).abs() < threshold {
            x = other_x - width;
            guides.vertical = Some(other_x as f32);
        }
        if guides.vertical.is_some() {
            break;
        }
    }

    for other in widgets.iter().filter(|w| w.id != moving) {
        let other_y = i64::from(other.position.1);
        if ((y - other_y) as f32).abs() < threshold {
            y = other_y;
            guides.horizontal = Some(other_y as f32);
            break;
        }
    }

    SnapResult {
        position: (x.max(0) as u32, y.max(0) as u32),
        guides,
    }
}

/// Circular drop target that deletes a dragged widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrashZone {
    /// Center in canvas pixels
    pub center: (f32, f32),
    /// Arming radius in pixels
    pub radius: f32,
}

impl TrashZone {
    /// Returns `true` when `pointer` is strictly within the arming radius.
    pub fn contains(&self, pointer: (f32, f32)) -> bool {
        let dx = pointer.0 - self.center.0;
        let dy = pointer.1 - self.center.1;
        dx.hypot(dy) < self.radius
    }
}

/// Which part of a widget the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// The widget body; starts a drag
    Body,
    /// The bottom-right resize handle; starts a resize
    ResizeHandle,
}

/// Finds the topmost widget under a canvas pixel position.
///
/// The resize handle is the square of `config.resize_handle_px` in the
/// widget's bottom-right corner.
pub fn hit_test(
    widgets: &[Widget],
    pointer: (f32, f32),
    config: &EditorConfig,
) -> Option<(WidgetId, HitTarget)> {
    let cell = config.cell_px;
    widgets.iter().rev().find_map(|widget| {
        let left = widget.position.0 as f32 * cell;
        let top = widget.position.1 as f32 * cell;
        let right = widget.right() as f32 * cell;
        let bottom = widget.bottom() as f32 * cell;
        let inside = pointer.0 >= left && pointer.0 < right && pointer.1 >= top && pointer.1 < bottom;
        if !inside {
            return None;
        }
        let handle = config.resize_handle_px;
        let target = if pointer.0 >= right - handle && pointer.1 >= bottom - handle {
            HitTarget::ResizeHandle
        } else {
            HitTarget::Body
        };
        Some((widget.id, target))
    })
}

/// State shared between the pointer events of one drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    /// Widget being dragged
    pub widget_id: WidgetId,
    /// Top-left cell when the gesture started
    pub start_position: (u32, u32),
    /// Pointer position (canvas pixels) when the gesture started
    pub pointer_origin: (f32, f32),
    /// The pointer is over the trash target
    pub pending_delete: bool,
    /// Guides from the latest move sample
    pub guides: Guides,
}

impl DragGesture {
    /// Unsnapped position for the current pointer: start plus rounded cell delta.
    pub fn candidate(&self, config: &EditorConfig, pointer: (f32, f32)) -> (i64, i64) {
        (
            i64::from(self.start_position.0)
                + config.cells_from_pixels(pointer.0 - self.pointer_origin.0),
            i64::from(self.start_position.1)
                + config.cells_from_pixels(pointer.1 - self.pointer_origin.1),
        )
    }
}

/// State shared between the pointer events of one resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeGesture {
    /// Widget being resized
    pub widget_id: WidgetId,
    /// Size in cells when the gesture started
    pub start_size: (u32, u32),
    /// Pointer position (canvas pixels) when the gesture started
    pub pointer_origin: (f32, f32),
}

impl ResizeGesture {
    /// Requested size for the current pointer, before the minimum-size clamp.
    pub fn requested_size(&self, config: &EditorConfig, pointer: (f32, f32)) -> (i64, i64) {
        (
            i64::from(self.start_size.0)
                + config.cells_from_pixels(pointer.0 - self.pointer_origin.0),
            i64::from(self.start_size.1)
                + config.cells_from_pixels(pointer.1 - self.pointer_origin.1),
        )
    }
}

/// The gesture currently in progress, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Moving a widget
    Drag(DragGesture),
    /// Resizing a widget
    Resize(ResizeGesture),
}

impl Gesture {
    /// The widget the gesture acts on.
    pub fn widget_id(&self) -> WidgetId {
        match self {
            Gesture::Drag(drag) => drag.widget_id,
            Gesture::Resize(resize) => resize.widget_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WidgetType;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn widget(x: u32, y: u32, w: u32, h: u32) -> Widget {
        Widget {
            id: Uuid::new_v4(),
            type_tag: WidgetType::Button,
            type_local_index: 1,
            position: (x, y),
            size: (w, h),
            label: String::new(),
            topic: String::new(),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_left_edge_snaps() {
        let a = widget(0, 0, 5, 5);
        let b = widget(10, 10, 3, 3);
        let result = snap_to_neighbors(&[a, b.clone()], b.id, (0, 8), b.size, 0.5);
        assert_eq!(result.position, (0, 8));
        assert_eq!(result.guides.vertical, Some(0.0));
        assert_eq!(result.guides.horizontal, None);
    }

    #[test]
    fn test_center_alignment_is_guide_only() {
        let a = widget(0, 0, 6, 2);
        let b = widget(10, 10, 4, 2);
        // b's center at x = 1 + 2 = 3 matches a's center
        let result = snap_to_neighbors(&[a, b.clone()], b.id, (1, 6), b.size, 0.5);
        assert_eq!(result.position, (1, 6));
        assert_eq!(result.guides.vertical, Some(3.0));
    }

    #[test]
    fn test_right_edge_snaps_to_neighbour_left() {
        let a = widget(10, 0, 4, 4);
        let b = widget(0, 10, 4, 4);
        let result = snap_to_neighbors(&[a, b.clone()], b.id, (6, 10), b.size, 0.5);
        assert_eq!(result.position, (6, 10));
        assert_eq!(result.guides.vertical, Some(10.0));
    }

    #[test]
    fn test_top_edge_snaps_and_first_neighbour_wins() {
        let a = widget(20, 4, 2, 2);
        let c = widget(40, 9, 2, 2);
        let b = widget(0, 0, 3, 3);
        let widgets = [a, c, b.clone()];
        let result = snap_to_neighbors(&widgets, b.id, (0, 4), b.size, 0.5);
        assert_eq!(result.guides.horizontal, Some(4.0));
        let result = snap_to_neighbors(&widgets, b.id, (0, 9), b.size, 0.5);
        assert_eq!(result.guides.horizontal, Some(9.0));
    }

    #[test]
    fn test_snapped_position_is_never_negative() {
        let a = widget(1, 0, 2, 2);
        let b = widget(5, 5, 4, 4);
        // right edge at -3 + 4 = 1 matches a.x, snapping x to 1 - 4 = -3
        let result = snap_to_neighbors(&[a, b.clone()], b.id, (-3, -7), b.size, 0.5);
        assert_eq!(result.position, (0, 0));
    }

    #[test]
    fn test_trash_zone_radius_is_exclusive() {
        let trash = TrashZone {
            center: (100.0, 100.0),
            radius: 80.0,
        };
        assert!(trash.contains((100.0, 100.0)));
        assert!(trash.contains((150.0, 150.0)));
        assert!(!trash.contains((180.0, 100.0)));
        assert!(!trash.contains((400.0, 100.0)));
    }

    #[test]
    fn test_hit_test_prefers_topmost_and_handle() {
        let config = EditorConfig::default();
        let below = widget(0, 0, 5, 5);
        let above = widget(2, 2, 5, 5);
        let widgets = [below.clone(), above.clone()];

        assert_eq!(
            hit_test(&widgets, (50.0, 50.0), &config),
            Some((above.id, HitTarget::Body))
        );
        assert_eq!(
            hit_test(&widgets, (10.0, 10.0), &config),
            Some((below.id, HitTarget::Body))
        );
        assert_eq!(
            hit_test(&widgets, (138.0, 138.0), &config),
            Some((above.id, HitTarget::ResizeHandle))
        );
        assert_eq!(hit_test(&widgets, (300.0, 10.0), &config), None);
    }

    #[test]
    fn test_gesture_deltas_round_to_cells() {
        let config = EditorConfig::default();
        let drag = DragGesture {
            widget_id: Uuid::new_v4(),
            start_position: (3, 3),
            pointer_origin: (100.0, 100.0),
            pending_delete: false,
            guides: Guides::default(),
        };
        assert_eq!(drag.candidate(&config, (129.0, 40.0)), (4, 0));

        let resize = ResizeGesture {
            widget_id: drag.widget_id,
            start_size: (4, 4),
            pointer_origin: (0.0, 0.0),
        };
        assert_eq!(resize.requested_size(&config, (-200.0, 51.0)), (-6, 7));
    }
}
