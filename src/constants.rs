//! Shared application-wide constants.
//! Centralizes tweakable values used across the editor core and the UI.

// Grid
/// Size of one grid cell in screen pixels.
pub const GRID_CELL_PX: f32 = 20.0;
/// Radius of the dots drawn at grid intersections (in screen pixels).
pub const GRID_DOT_RADIUS: f32 = 1.5;

// Widget geometry
/// Smallest width/height (in cells) any widget may be resized to.
pub const MIN_WIDGET_CELLS: u32 = 2;
/// Side length of the square resize handle in the bottom-right corner (in pixels).
pub const RESIZE_HANDLE_PX: f32 = 12.0;
/// Corner radius for widget rectangles (in pixels).
pub const WIDGET_CORNER_RADIUS: f32 = 6.0;

// Layout engine
/// Distance (in cells) under which two edges or centers count as aligned.
pub const ALIGN_THRESHOLD_CELLS: f32 = 0.5;
/// Radius around the trash target center that arms drag-to-delete (in pixels).
pub const TRASH_RADIUS_PX: f32 = 80.0;
/// Radius of the drawn trash target (in pixels).
pub const TRASH_DRAW_RADIUS_PX: f32 = 28.0;
/// Distance of the trash target center from the bottom edge of the canvas (in pixels).
pub const TRASH_BOTTOM_OFFSET_PX: f32 = 60.0;

// Undo
/// Maximum number of undo snapshots to retain.
pub const MAX_UNDO_HISTORY: usize = 20;

// Topics
/// Base topic used when a project does not configure one.
pub const DEFAULT_BASE_TOPIC: &str = "panelcraft";
/// Broker shown for new projects.
pub const DEFAULT_BROKER: &str = "broker.emqx.io";
/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

// Console
/// Number of console lines kept before the oldest are dropped.
pub const MESSAGE_LOG_CAPACITY: usize = 200;

// Placement
/// Cell used when a widget is added from the palette without a drop position.
pub const DEFAULT_PLACEMENT_CELL: (u32, u32) = (5, 5);

/// On-disk format version of saved dashboards.
pub const DASHBOARD_FORMAT_VERSION: u32 = 1;
