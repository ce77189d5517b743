//! Widget type registry.
//!
//! Maps each [`WidgetType`] to a descriptor record holding its defaults, its
//! property schema and the function-valued hooks that give the type its
//! behaviour: building the visual content, applying property edits to that
//! content, reacting to runtime input and reacting to inbound messages.
//!
//! The registry is an explicit context object owned by the editing session; it
//! is filled once when the session opens and only read afterwards.

use crate::types::{Widget, WidgetType};
use std::collections::BTreeMap;

/// Reserved property key that edits [`Widget::label`].
pub const LABEL_KEY: &str = "label";
/// Reserved property key that edits [`Widget::topic`].
pub const TOPIC_KEY: &str = "topic";

/// How a property value is edited and validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    /// Free-form text
    Text,
    /// Free-form text that must not be empty
    RequiredText,
    /// A number, optionally bounded (inclusive)
    Number {
        /// Lower bound
        min: Option<f64>,
        /// Upper bound
        max: Option<f64>,
    },
    /// A `#RRGGBB` colour
    Color,
    /// One of a fixed set of values
    Choice(&'static [&'static str]),
}

/// One editable field in a widget type's property form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyField {
    /// Key in [`Widget::properties`], or one of the reserved keys
    pub key: &'static str,
    /// Caption shown in the properties panel
    pub caption: &'static str,
    /// Editing/validation rule
    pub kind: PropertyKind,
    /// Value assigned when a widget is placed
    pub default: &'static str,
}

/// Type-specific visual content, created once per widget by the render hook.
///
/// Each variant holds the widget's meaningful sub-elements directly, so the
/// renderer and the message handlers never look them up by position.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetContent {
    /// Push button caption and pressed state
    Button { caption: String, pressed: bool },
    /// Toggle state
    Switch { on: bool },
    /// Lamp state
    Led { lit: bool },
    /// Last displayed value and unit suffix
    Text { value: Option<String>, unit: String },
    /// Current value and range
    Slider {
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    /// Image source (URL or path)
    Image { source: String },
    /// Frames received so far and the size of the last one
    Camera { frames: u64, last_frame_bytes: usize },
    /// Last reading and scale
    Thermometer {
        reading: Option<f64>,
        min: f64,
        max: f64,
        unit: String,
    },
}

/// A message the core asks the transport to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    /// Destination topic
    pub topic: String,
    /// Payload text
    pub payload: String,
}

/// Pointer input delivered to a widget while the dashboard runs.
///
/// `fraction` is the horizontal pointer position inside the widget, 0.0 at the
/// left edge and 1.0 at the right edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// Pointer pressed on the widget
    Press { fraction: f32 },
    /// Pointer moved while pressed
    Drag { fraction: f32 },
    /// Pointer released
    Release,
}

/// Builds the visual content for a freshly placed widget.
pub type RenderFn = fn(&Widget) -> WidgetContent;
/// Applies the widget's current properties to existing content.
pub type PropertyEditFn = fn(&Widget, &mut WidgetContent);
/// Reacts to runtime input, returning the messages to publish.
pub type RuntimeInputFn = fn(&Widget, &mut WidgetContent, Interaction) -> Vec<Publish>;
/// Reacts to an inbound payload; returns `true` when the content changed.
pub type MessageFn = fn(&Widget, &mut WidgetContent, &str) -> bool;

/// Everything the editor needs to know about one widget type.
#[derive(Debug, Clone)]
pub struct WidgetDescriptor {
    /// The type this descriptor describes
    pub type_tag: WidgetType,
    /// Size in cells given to newly placed widgets
    pub default_size: (u32, u32),
    /// Smallest size in cells a resize may produce
    pub min_size: (u32, u32),
    /// Short lowercase prefix used for generated identifiers
    pub label_prefix: &'static str,
    /// Type-specific editable properties (label and topic are implicit)
    pub property_schema: &'static [PropertyField],
    /// Creates the visual content
    pub render: RenderFn,
    /// Refreshes the content after a property edit
    pub on_property_edit: PropertyEditFn,
    /// Handles runtime pointer input
    pub on_runtime_input: RuntimeInputFn,
    /// Handles inbound messages
    pub on_message: MessageFn,
}

impl WidgetDescriptor {
    /// Looks up a schema field by key.
    pub fn field(&self, key: &str) -> Option<&'static PropertyField> {
        self.property_schema.iter().find(|field| field.key == key)
    }
}

/// Lookup table from widget type to descriptor.
#[derive(Debug, Clone)]
pub struct WidgetRegistry {
    descriptors: BTreeMap<WidgetType, WidgetDescriptor>,
}

impl Default for WidgetRegistry {
    /// A registry with every built-in widget type registered.
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

impl WidgetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            descriptors: BTreeMap::new(),
        }
    }

    /// Creates a registry holding the built-in widget types.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        for descriptor in crate::widgets::builtin_descriptors() {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds the descriptor, replacing any previous one for the same type.
    pub fn register(&mut self, descriptor: WidgetDescriptor) {
        self.descriptors.insert(descriptor.type_tag, descriptor);
    }

    /// Returns the descriptor for `type_tag`, if registered.
    pub fn get(&self, type_tag: WidgetType) -> Option<&WidgetDescriptor> {
        self.descriptors.get(&type_tag)
    }

    /// Looks up a descriptor from a textual tag. Unknown tags yield `None`.
    pub fn get_by_tag(&self, tag: &str) -> Option<&WidgetDescriptor> {
        WidgetType::from_tag(tag).and_then(|ty| self.get(ty))
    }

    /// The registered types, for building a palette.
    pub fn list_types(&self) -> Vec<WidgetType> {
        self.descriptors.keys().copied().collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_has_every_type() {
        let registry = WidgetRegistry::default();
        assert_eq!(registry.len(), WidgetType::ALL.len());
        assert_eq!(registry.list_types(), WidgetType::ALL.to_vec());
        for ty in WidgetType::ALL {
            let descriptor = registry.get(ty).expect("builtin descriptor");
            assert_eq!(descriptor.type_tag, ty);
            assert!(descriptor.default_size.0 >= descriptor.min_size.0);
            assert!(descriptor.default_size.1 >= descriptor.min_size.1);
        }
    }

    #[test]
    fn test_register_replaces_by_tag() {
        let mut registry = WidgetRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(WidgetType::Led).is_none());

        let mut led = WidgetRegistry::with_builtin_types()
            .get(WidgetType::Led)
            .cloned()
            .unwrap();
        registry.register(led.clone());
        led.default_size = (9, 9);
        registry.register(led);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(WidgetType::Led).unwrap().default_size, (9, 9));
    }

    #[test]
    fn test_lookup_by_tag() {
        let registry = WidgetRegistry::default();
        assert!(registry.get_by_tag("slider").is_some());
        assert!(registry.get_by_tag("GAUGE").is_none());
        assert!(WidgetRegistry::new().get_by_tag("slider").is_none());
    }

    #[test]
    fn test_schema_field_lookup() {
        let registry = WidgetRegistry::default();
        let slider = registry.get(WidgetType::Slider).unwrap();
        assert!(matches!(
            slider.field("max").map(|f| f.kind),
            Some(PropertyKind::Number { .. })
        ));
        assert!(slider.field("payload").is_none());
    }
}
