//! The scene model: placed widgets, the selection and the edit/run mode.
//!
//! The scene is the single source of truth for the dashboard layout. Its
//! operations are plain mutations; taking undo snapshots and re-syncing the
//! renderer around them is the editing session's job.

use crate::constants::MIN_WIDGET_CELLS;
use crate::registry::{WidgetRegistry, LABEL_KEY, TOPIC_KEY};
use crate::types::{Mode, Widget, WidgetId, WidgetType};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ordered widget collection plus selection and mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Widgets in z-order (later entries draw on top)
    widgets: Vec<Widget>,
    /// Currently selected widget
    selected: Option<WidgetId>,
    /// Edit or run
    mode: Mode,
    /// Prefix for generated topics
    pub base_topic: String,
    /// Bumped on every widget mutation
    revision: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_BASE_TOPIC)
    }
}

impl Scene {
    /// Creates an empty scene in edit mode.
    pub fn new(base_topic: &str) -> Self {
        Self {
            widgets: Vec::new(),
            selected: None,
            mode: Mode::Edit,
            base_topic: base_topic.to_string(),
            revision: 0,
        }
    }

    /// All widgets in z-order.
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Finds a widget by id.
    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    /// Returns `true` if a widget with this id exists.
    pub fn contains(&self, id: WidgetId) -> bool {
        self.get(id).is_some()
    }

    /// The selected widget id, if any.
    pub fn selected(&self) -> Option<WidgetId> {
        self.selected
    }

    /// The selected widget, if any.
    pub fn selected_widget(&self) -> Option<&Widget> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Counter that changes whenever the widget list changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Smallest positive index not used by another widget of `type_tag`.
    pub fn next_type_local_index(&self, type_tag: WidgetType) -> u32 {
        let mut used: Vec<u32> = self
            .widgets
            .iter()
            .filter(|w| w.type_tag == type_tag)
            .map(|w| w.type_local_index)
            .collect();
        used.sort_unstable();
        used.dedup();

        let mut candidate = 1;
        for index in used {
            if index == candidate {
                candidate += 1;
            } else if index > candidate {
                break;
            }
        }
        candidate
    }

    /// Places a new widget of `type_tag` with its top-left at the given cell.
    ///
    /// The widget gets the descriptor's default size, the smallest free
    /// type-local index, a generated label and topic, and every schema
    /// property at its default. It is appended on top and selected.
    ///
    /// # Returns
    ///
    /// The new widget's id, or `None` when the type is not registered.
    pub fn place_widget(
        &mut self,
        registry: &WidgetRegistry,
        type_tag: WidgetType,
        cell_x: u32,
        cell_y: u32,
    ) -> Option<WidgetId> {
        let descriptor = registry.get(type_tag)?;
        let index = self.next_type_local_index(type_tag);
        let properties: BTreeMap<String, String> = descriptor
            .property_schema
            .iter()
            .map(|field| (field.key.to_string(), field.default.to_string()))
            .collect();

        let widget = Widget {
            id: Uuid::new_v4(),
            type_tag,
            type_local_index: index,
            position: (cell_x, cell_y),
            size: descriptor.default_size,
            label: format!("{} {}", type_tag.tag(), index),
            topic: format!(
                "{}/{}/{}",
                self.base_topic,
                type_tag.tag().to_lowercase(),
                index
            ),
            properties,
        };
        let id = widget.id;
        log::debug!("placed {} at ({cell_x}, {cell_y})", widget.label);
        self.widgets.push(widget);
        self.selected = Some(id);
        self.touch();
        Some(id)
    }

    /// Selects `id`, or clears the selection for `None` or an unknown id.
    pub fn select(&mut self, id: Option<WidgetId>) {
        self.selected = id.filter(|id| self.contains(*id));
    }

    /// Moves a widget, clamping both coordinates to be non-negative.
    ///
    /// # Returns
    ///
    /// `true` if the widget exists (even when its position did not change).
    pub fn move_widget(&mut self, id: WidgetId, x: i64, y: i64) -> bool {
        let Some(widget) = self.get_mut(id) else {
            return false;
        };
        let position = (clamp_cell(x, 0), clamp_cell(y, 0));
        if widget.position != position {
            widget.position = position;
            self.touch();
        }
        true
    }

    /// Resizes a widget, clamping each axis to its type's minimum size.
    pub fn resize_widget(
        &mut self,
        registry: &WidgetRegistry,
        id: WidgetId,
        width: i64,
        height: i64,
    ) -> bool {
        let Some(type_tag) = self.get(id).map(|w| w.type_tag) else {
            return false;
        };
        let min = registry
            .get(type_tag)
            .map(|d| d.min_size)
            .unwrap_or((MIN_WIDGET_CELLS, MIN_WIDGET_CELLS));
        let size = (clamp_cell(width, min.0), clamp_cell(height, min.1));
        if let Some(widget) = self.get_mut(id) {
            if widget.size != size {
                widget.size = size;
                self.touch();
            }
        }
        true
    }

    /// Removes a widget, clearing the selection if it pointed at it.
    pub fn delete_widget(&mut self, id: WidgetId) -> Option<Widget> {
        let index = self.widgets.iter().position(|w| w.id == id)?;
        let removed = self.widgets.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.touch();
        Some(removed)
    }

    /// Sets a property value; `label` and `topic` write the dedicated fields.
    pub fn set_property(&mut self, id: WidgetId, key: &str, value: &str) -> bool {
        let Some(widget) = self.get_mut(id) else {
            return false;
        };
        match key {
            LABEL_KEY => widget.label = value.to_string(),
            TOPIC_KEY => widget.topic = value.trim().to_string(),
            _ => {
                widget.properties.insert(key.to_string(), value.to_string());
            }
        }
        self.touch();
        true
    }

    /// Switches mode. Entering run mode clears the selection.
    ///
    /// # Returns
    ///
    /// `true` if the mode actually changed.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        if mode == Mode::Run {
            self.selected = None;
        }
        true
    }

    /// Replaces the whole widget list (undo, load) and clears the selection.
    pub fn replace_widgets(&mut self, widgets: Vec<Widget>) {
        self.widgets = widgets;
        self.selected = None;
        self.touch();
    }
}

fn clamp_cell(value: i64, min: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(u32::MAX)) as u32
}
