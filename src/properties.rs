//! Properties panel binder.
//!
//! Mirrors the selected widget's label, topic and schema properties into an
//! editable form. Each field keeps the committed value next to the text being
//! typed; a draft only reaches the scene after it validates, and a rejected
//! draft leaves the committed value untouched.

use crate::error::PropertyError;
use crate::registry::{PropertyKind, WidgetDescriptor, WidgetRegistry, LABEL_KEY, TOPIC_KEY};
use crate::render::parse_hex_color;
use crate::types::{Widget, WidgetId};

/// One row of the properties form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// Property key (or `label`/`topic`)
    pub key: &'static str,
    /// Caption shown next to the editor
    pub caption: &'static str,
    /// Validation rule
    pub kind: PropertyKind,
    /// Value currently stored on the widget
    pub value: String,
    /// Text in the editor, possibly not yet valid
    pub draft: String,
    /// Why the last commit of this field was rejected
    pub error: Option<PropertyError>,
}

impl FormField {
    fn new(key: &'static str, caption: &'static str, kind: PropertyKind, value: &str) -> Self {
        Self {
            key,
            caption,
            kind,
            value: value.to_string(),
            draft: value.to_string(),
            error: None,
        }
    }

    /// Returns `true` when the draft differs from the stored value.
    pub fn is_dirty(&self) -> bool {
        self.draft != self.value
    }
}

/// The form for one selected widget.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyForm {
    /// Widget being edited
    pub widget_id: WidgetId,
    /// Label, topic, then the type's schema fields
    pub fields: Vec<FormField>,
}

impl PropertyForm {
    /// Looks up a field by key.
    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.key == key)
    }
}

/// Two-way binding between the selection and the properties form.
#[derive(Debug, Clone, Default)]
pub struct PropertiesBinder {
    form: Option<PropertyForm>,
}

impl PropertiesBinder {
    /// Creates a binder with no form shown.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current form; `None` means the panel is hidden.
    pub fn form(&self) -> Option<&PropertyForm> {
        self.form.as_ref()
    }

    /// Populates the form from `widget`, or hides it for `None`.
    ///
    /// Re-binding the widget that is already shown refreshes the stored values
    /// and resets any field whose draft is not mid-edit.
    pub fn bind(&mut self, registry: &WidgetRegistry, widget: Option<&Widget>) {
        let Some(widget) = widget else {
            self.form = None;
            return;
        };
        let Some(descriptor) = registry.get(widget.type_tag) else {
            self.form = None;
            return;
        };

        if let Some(form) = self.form.as_mut().filter(|f| f.widget_id == widget.id) {
            for field in &mut form.fields {
                let current = current_value(widget, field.key);
                if field.value != current {
                    let editing = field.is_dirty() || field.error.is_some();
                    field.value = current.to_string();
                    if !editing {
                        field.draft = field.value.clone();
                    }
                }
            }
            return;
        }

        let mut fields = vec![
            FormField::new(LABEL_KEY, "Label", PropertyKind::Text, &widget.label),
            FormField::new(TOPIC_KEY, "Topic", PropertyKind::Text, &widget.topic),
        ];
        fields.extend(descriptor.property_schema.iter().map(|schema| {
            FormField::new(schema.key, schema.caption, schema.kind, widget.property(schema.key))
        }));
        self.form = Some(PropertyForm {
            widget_id: widget.id,
            fields,
        });
    }

    /// Replaces a field's draft text.
    pub fn set_draft(&mut self, key: &str, text: &str) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.field_mut(key)) {
            field.draft = text.to_string();
        }
    }

    /// Key, widget and draft text of a field, ready for committing.
    pub fn draft(&self, key: &str) -> Option<(WidgetId, String)> {
        let form = self.form.as_ref()?;
        form.field(key).map(|f| (form.widget_id, f.draft.clone()))
    }

    /// Records a successful commit: stored value and draft become `value`.
    pub fn accept(&mut self, key: &str, value: &str) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.field_mut(key)) {
            field.value = value.to_string();
            field.draft = value.to_string();
            field.error = None;
        }
    }

    /// Records a rejected commit; the stored value stays as it was.
    pub fn reject(&mut self, key: &str, error: PropertyError) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.field_mut(key)) {
            field.error = Some(error);
        }
    }

    /// Throws away a field's draft and error.
    pub fn revert(&mut self, key: &str) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.field_mut(key)) {
            field.draft = field.value.clone();
            field.error = None;
        }
    }
}

fn current_value<'a>(widget: &'a Widget, key: &str) -> &'a str {
    match key {
        LABEL_KEY => &widget.label,
        TOPIC_KEY => &widget.topic,
        _ => widget.property(key),
    }
}

/// Validates and normalizes a property value for a widget type.
///
/// Keys outside the type's schema are accepted as free text. Topics may not
/// contain MQTT wildcards since widgets publish to them.
///
/// # Returns
///
/// The value to store (trimmed numbers, upper-case colours, canonical choices).
pub fn validate_property(
    descriptor: Option<&WidgetDescriptor>,
    key: &str,
    raw: &str,
) -> Result<String, PropertyError> {
    if key == TOPIC_KEY {
        let topic = raw.trim();
        if topic.contains(['+', '#']) {
            return Err(PropertyError::WildcardTopic(topic.to_string()));
        }
        return Ok(topic.to_string());
    }
    let kind = descriptor
        .and_then(|d| d.field(key))
        .map(|field| field.kind)
        .unwrap_or(PropertyKind::Text);
    validate_value(kind, key, raw)
}

/// Applies one [`PropertyKind`] rule to a raw value.
pub fn validate_value(kind: PropertyKind, key: &str, raw: &str) -> Result<String, PropertyError> {
    match kind {
        PropertyKind::Text => Ok(raw.to_string()),
        PropertyKind::RequiredText => {
            if raw.trim().is_empty() {
                Err(PropertyError::Empty(key.to_string()))
            } else {
                Ok(raw.to_string())
            }
        }
        PropertyKind::Number { min, max } => {
            let trimmed = raw.trim();
            let number = trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| PropertyError::NotANumber {
                    key: key.to_string(),
                    value: raw.to_string(),
                })?;
            let below = min.is_some_and(|min| number < min);
            let above = max.is_some_and(|max| number > max);
            if below || above {
                return Err(PropertyError::OutOfRange {
                    key: key.to_string(),
                    value: number,
                    min: min.unwrap_or(f64::NEG_INFINITY),
                    max: max.unwrap_or(f64::INFINITY),
                });
            }
            Ok(trimmed.to_string())
        }
        PropertyKind::Color => parse_hex_color(raw)
            .map(|[r, g, b]| format!("#{r:02X}{g:02X}{b:02X}"))
            .ok_or_else(|| PropertyError::InvalidColor {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        PropertyKind::Choice(options) => options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(raw.trim()))
            .map(|option| option.to_string())
            .ok_or_else(|| PropertyError::InvalidChoice {
                key: key.to_string(),
                value: raw.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use crate::types::WidgetType;

    #[test]
    fn test_numbers_are_coerced_or_rejected() {
        let kind = PropertyKind::Number {
            min: Some(0.001),
            max: None,
        };
        assert_eq!(validate_value(kind, "step", " 2.5 "), Ok("2.5".to_string()));
        assert!(matches!(
            validate_value(kind, "step", "fast"),
            Err(PropertyError::NotANumber { .. })
        ));
        assert!(matches!(
            validate_value(kind, "step", "NaN"),
            Err(PropertyError::NotANumber { .. })
        ));
        assert!(matches!(
            validate_value(kind, "step", "0"),
            Err(PropertyError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_colors_and_choices_are_normalized() {
        assert_eq!(
            validate_value(PropertyKind::Color, "color", "ff00aa"),
            Ok("#FF00AA".to_string())
        );
        assert!(validate_value(PropertyKind::Color, "color", "red").is_err());
        let choice = PropertyKind::Choice(&["tap", "hold"]);
        assert_eq!(validate_value(choice, "trigger_mode", "HOLD"), Ok("hold".to_string()));
        assert!(matches!(
            validate_value(choice, "trigger_mode", "double"),
            Err(PropertyError::InvalidChoice { .. })
        ));
        assert_eq!(
            validate_value(PropertyKind::RequiredText, "payload_on", "  "),
            Err(PropertyError::Empty("payload_on".to_string()))
        );
    }

    #[test]
    fn test_topics_reject_wildcards() {
        assert_eq!(validate_property(None, TOPIC_KEY, " a/b "), Ok("a/b".to_string()));
        assert!(matches!(
            validate_property(None, TOPIC_KEY, "a/#"),
            Err(PropertyError::WildcardTopic(_))
        ));
        assert_eq!(validate_property(None, "anything", "x"), Ok("x".to_string()));
    }

    #[test]
    fn test_bind_follows_selection() {
        let registry = WidgetRegistry::default();
        let mut scene = Scene::default();
        let id = scene.place_widget(&registry, WidgetType::Slider, 0, 0).unwrap();
        let mut binder = PropertiesBinder::new();

        binder.bind(&registry, scene.selected_widget());
        let form = binder.form().unwrap();
        assert_eq!(form.widget_id, id);
        let keys: Vec<&str> = form.fields.iter().map(|f| f.key).collect();
        assert_eq!(keys, ["label", "topic", "color", "min", "max", "step"]);
        assert_eq!(form.field("label").unwrap().value, "SLIDER 1");

        scene.select(None);
        binder.bind(&registry, scene.selected_widget());
        assert!(binder.form().is_none());
    }

    #[test]
    fn test_rebind_keeps_drafts_in_progress() {
        let registry = WidgetRegistry::default();
        let mut scene = Scene::default();
        let id = scene.place_widget(&registry, WidgetType::Text, 0, 0).unwrap();
        let mut binder = PropertiesBinder::new();
        binder.bind(&registry, scene.get(id));

        binder.set_draft("unit", "kPa");
        scene.set_property(id, LABEL_KEY, "Pressure");
        binder.bind(&registry, scene.get(id));

        let form = binder.form().unwrap();
        assert_eq!(form.field("label").unwrap().draft, "Pressure");
        assert_eq!(form.field("unit").unwrap().draft, "kPa");
        assert_eq!(binder.draft("unit"), Some((id, "kPa".to_string())));

        binder.revert("unit");
        assert!(!binder.form().unwrap().field("unit").unwrap().is_dirty());
    }
}
