//! Retained visual model of the scene.
//!
//! The renderer keeps one [`VisualElement`] per widget, keyed by id. Syncing
//! updates an element in place; the type-specific content is built once by
//! the descriptor's render hook and only ever mutated afterwards, so runtime
//! state such as a switch position survives moves and property edits.
//!
//! The egui layer paints from these elements; nothing here depends on egui.

use crate::layout::Guides;
use crate::registry::{Interaction, Publish, WidgetContent, WidgetRegistry};
use crate::types::{Widget, WidgetId};
use std::collections::HashMap;

/// Colour used when a widget's `color` property is missing or malformed.
pub const FALLBACK_COLOR: [u8; 3] = [0x9E, 0x9E, 0x9E];

/// On-screen representation of one widget.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    /// Widget this element shows
    pub widget_id: WidgetId,
    /// Top-left cell
    pub position: (u32, u32),
    /// Size in cells
    pub size: (u32, u32),
    /// Caption
    pub label: String,
    /// Fill colour
    pub color: [u8; 3],
    /// Selection highlight
    pub selected: bool,
    /// Drawn faded while hovering over the trash target
    pub dimmed: bool,
    /// Type-specific sub-elements
    pub content: WidgetContent,
}

/// Parses `#RRGGBB` (the leading `#` is optional).
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// The set of visual elements plus the edit-only overlays.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    elements: HashMap<WidgetId, VisualElement>,
    /// Draw order, matching the scene's z-order
    order: Vec<WidgetId>,
    /// Number of elements ever created
    creations: u64,
    /// Resize handles and selection chrome are visible (edit mode)
    pub edit_chrome: bool,
    /// The trash target is shown (a drag is active)
    pub trash_visible: bool,
    /// The trash target is highlighted (pending delete)
    pub trash_active: bool,
    /// Alignment guides for the current drag sample
    pub guides: Guides,
}

impl Renderer {
    /// Creates an empty renderer with edit chrome enabled.
    pub fn new() -> Self {
        Self {
            edit_chrome: true,
            ..Self::default()
        }
    }

    /// Creates or updates the element for `widget`.
    ///
    /// Calling this repeatedly with unchanged data leaves the element set and
    /// every attribute unchanged.
    ///
    /// # Returns
    ///
    /// `false` when the widget's type is not registered and no element exists.
    pub fn sync(&mut self, registry: &WidgetRegistry, widget: &Widget, selected: bool) -> bool {
        let color = parse_hex_color(widget.property("color")).unwrap_or(FALLBACK_COLOR);
        if let Some(element) = self.elements.get_mut(&widget.id) {
            element.position = widget.position;
            element.size = widget.size;
            if element.label != widget.label {
                element.label.clone_from(&widget.label);
            }
            element.color = color;
            element.selected = selected;
            return true;
        }

        let Some(descriptor) = registry.get(widget.type_tag) else {
            log::warn!("no renderer for widget type {}", widget.type_tag);
            return false;
        };
        let element = VisualElement {
            widget_id: widget.id,
            position: widget.position,
            size: widget.size,
            label: widget.label.clone(),
            color,
            selected,
            dimmed: false,
            content: (descriptor.render)(widget),
        };
        self.elements.insert(widget.id, element);
        self.order.push(widget.id);
        self.creations += 1;
        true
    }

    /// Re-syncs after the whole widget list was replaced.
    ///
    /// Elements for widgets that no longer exist are dropped. Surviving
    /// elements are re-derived from their widget's properties, so runtime
    /// state is kept but anything taken from the schema follows the new data.
    /// Draw order follows `widgets`.
    pub fn sync_all(
        &mut self,
        registry: &WidgetRegistry,
        widgets: &[Widget],
        selected: Option<WidgetId>,
    ) {
        self.elements
            .retain(|id, _| widgets.iter().any(|widget| widget.id == *id));
        self.order.clear();
        for widget in widgets {
            if self.sync(registry, widget, selected == Some(widget.id))
                && !self.order.contains(&widget.id)
            {
                self.order.push(widget.id);
            }
            if let (Some(element), Some(descriptor)) = (
                self.elements.get_mut(&widget.id),
                registry.get(widget.type_tag),
            ) {
                (descriptor.on_property_edit)(widget, &mut element.content);
                element.dimmed = false;
            }
        }
    }

    /// Refreshes an element's content after one of its properties changed.
    pub fn apply_property_edit(&mut self, registry: &WidgetRegistry, widget: &Widget, selected: bool) {
        if !self.sync(registry, widget, selected) {
            return;
        }
        if let (Some(element), Some(descriptor)) = (
            self.elements.get_mut(&widget.id),
            registry.get(widget.type_tag),
        ) {
            (descriptor.on_property_edit)(widget, &mut element.content);
        }
    }

    /// Routes an inbound payload to the widget's message hook.
    ///
    /// # Returns
    ///
    /// `true` if the element's content changed.
    pub fn apply_message(&mut self, registry: &WidgetRegistry, widget: &Widget, payload: &str) -> bool {
        match (
            self.elements.get_mut(&widget.id),
            registry.get(widget.type_tag),
        ) {
            (Some(element), Some(descriptor)) => {
                (descriptor.on_message)(widget, &mut element.content, payload)
            }
            _ => false,
        }
    }

    /// Routes runtime pointer input to the widget's input hook.
    pub fn apply_input(
        &mut self,
        registry: &WidgetRegistry,
        widget: &Widget,
        input: Interaction,
    ) -> Vec<Publish> {
        match (
            self.elements.get_mut(&widget.id),
            registry.get(widget.type_tag),
        ) {
            (Some(element), Some(descriptor)) => {
                (descriptor.on_runtime_input)(widget, &mut element.content, input)
            }
            _ => Vec::new(),
        }
    }

    /// Marks an element as hovering over the trash target.
    pub fn set_dimmed(&mut self, id: WidgetId, dimmed: bool) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.dimmed = dimmed;
        }
    }

    /// Drops the element for a deleted widget.
    pub fn remove(&mut self, id: WidgetId) {
        self.elements.remove(&id);
        self.order.retain(|other| *other != id);
    }

    /// Hides guides and the trash target.
    pub fn clear_overlays(&mut self) {
        self.guides = Guides::default();
        self.trash_visible = false;
        self.trash_active = false;
    }

    /// Looks up the element for a widget.
    pub fn element(&self, id: WidgetId) -> Option<&VisualElement> {
        self.elements.get(&id)
    }

    /// Elements in draw order.
    pub fn elements(&self) -> impl Iterator<Item = &VisualElement> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` when nothing is rendered.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// How many elements have been created over the renderer's lifetime.
    pub fn creations(&self) -> u64 {
        self.creations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use crate::types::WidgetType;

    fn placed(ty: WidgetType) -> (Scene, WidgetRegistry, WidgetId) {
        let registry = WidgetRegistry::default();
        let mut scene = Scene::default();
        let id = scene.place_widget(&registry, ty, 1, 1).unwrap();
        (scene, registry, id)
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#2196F3"), Some([0x21, 0x96, 0xF3]));
        assert_eq!(parse_hex_color("ff0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
        assert_eq!(parse_hex_color("#ÿÿÿ"), None);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let (scene, registry, id) = placed(WidgetType::Switch);
        let widget = scene.get(id).unwrap();
        let mut renderer = Renderer::new();

        renderer.sync(&registry, widget, true);
        let first = renderer.element(id).cloned();
        renderer.sync(&registry, widget, true);

        assert_eq!(renderer.len(), 1);
        assert_eq!(renderer.creations(), 1);
        assert_eq!(renderer.element(id).cloned(), first);
    }

    #[test]
    fn test_sync_updates_in_place_and_keeps_content() {
        let (mut scene, registry, id) = placed(WidgetType::Led);
        let mut renderer = Renderer::new();
        renderer.sync(&registry, scene.get(id).unwrap(), false);
        assert!(renderer.apply_message(&registry, scene.get(id).unwrap(), "on"));

        scene.move_widget(id, 9, 2);
        scene.set_property(id, "color", "#000000");
        renderer.sync(&registry, scene.get(id).unwrap(), true);

        let element = renderer.element(id).unwrap();
        assert_eq!(element.position, (9, 2));
        assert_eq!(element.color, [0, 0, 0]);
        assert!(element.selected);
        assert_eq!(element.content, WidgetContent::Led { lit: true });
        assert_eq!(renderer.creations(), 1);
    }

    #[test]
    fn test_sync_all_drops_missing_and_reorders() {
        let registry = WidgetRegistry::default();
        let mut scene = Scene::default();
        let a = scene.place_widget(&registry, WidgetType::Led, 0, 0).unwrap();
        let b = scene.place_widget(&registry, WidgetType::Text, 0, 0).unwrap();
        let mut renderer = Renderer::new();
        renderer.sync_all(&registry, scene.widgets(), None);
        assert_eq!(renderer.len(), 2);

        let only_b: Vec<Widget> = scene.widgets().iter().filter(|w| w.id == b).cloned().collect();
        renderer.sync_all(&registry, &only_b, Some(b));
        assert!(renderer.element(a).is_none());
        assert!(renderer.element(b).unwrap().selected);
        assert_eq!(renderer.elements().count(), 1);
        assert_eq!(renderer.creations(), 2);
    }

    #[test]
    fn test_malformed_color_falls_back() {
        let (mut scene, registry, id) = placed(WidgetType::Button);
        scene.set_property(id, "color", "blue");
        let mut renderer = Renderer::new();
        renderer.sync(&registry, scene.get(id).unwrap(), false);
        assert_eq!(renderer.element(id).unwrap().color, FALLBACK_COLOR);
    }

    #[test]
    fn test_unregistered_type_is_not_rendered() {
        let (scene, _, id) = placed(WidgetType::Camera);
        let mut renderer = Renderer::new();
        assert!(!renderer.sync(&WidgetRegistry::new(), scene.get(id).unwrap(), false));
        assert!(renderer.is_empty());
        assert!(renderer.apply_input(&WidgetRegistry::new(), scene.get(id).unwrap(), Interaction::Release).is_empty());
    }
}
