//! Built-in widget types.
//!
//! Each type is a [`WidgetDescriptor`] whose hooks are plain functions. The
//! hooks only touch the widget's own [`WidgetContent`]; they never see the
//! scene, so a message for one widget cannot disturb another.

use crate::constants::MIN_WIDGET_CELLS;
use crate::registry::{
    Interaction, PropertyField, PropertyKind, Publish, WidgetContent, WidgetDescriptor,
};
use crate::types::{Widget, WidgetType};

const MIN_SIZE: (u32, u32) = (MIN_WIDGET_CELLS, MIN_WIDGET_CELLS);

const COLOR: PropertyField = PropertyField {
    key: "color",
    caption: "Colour",
    kind: PropertyKind::Color,
    default: "#2196F3",
};

const BUTTON_SCHEMA: &[PropertyField] = &[
    COLOR,
    PropertyField {
        key: "text",
        caption: "Caption",
        kind: PropertyKind::Text,
        default: "PUSH",
    },
    PropertyField {
        key: "payload",
        caption: "Payload",
        kind: PropertyKind::Text,
        default: "1",
    },
    PropertyField {
        key: "payload_release",
        caption: "Release payload",
        kind: PropertyKind::Text,
        default: "0",
    },
    PropertyField {
        key: "trigger_mode",
        caption: "Trigger",
        kind: PropertyKind::Choice(&["tap", "hold"]),
        default: "tap",
    },
];

const SWITCH_SCHEMA: &[PropertyField] = &[
    COLOR,
    PropertyField {
        key: "payload_on",
        caption: "On payload",
        kind: PropertyKind::RequiredText,
        default: "ON",
    },
    PropertyField {
        key: "payload_off",
        caption: "Off payload",
        kind: PropertyKind::RequiredText,
        default: "OFF",
    },
];

const LED_SCHEMA: &[PropertyField] = &[PropertyField {
    default: "#4CAF50",
    ..COLOR
}];

const TEXT_SCHEMA: &[PropertyField] = &[
    COLOR,
    PropertyField {
        key: "unit",
        caption: "Unit",
        kind: PropertyKind::Text,
        default: "",
    },
];

const SLIDER_SCHEMA: &[PropertyField] = &[
    COLOR,
    PropertyField {
        key: "min",
        caption: "Minimum",
        kind: PropertyKind::Number {
            min: None,
            max: None,
        },
        default: "0",
    },
    PropertyField {
        key: "max",
        caption: "Maximum",
        kind: PropertyKind::Number {
            min: None,
            max: None,
        },
        default: "100",
    },
    PropertyField {
        key: "step",
        caption: "Step",
        kind: PropertyKind::Number {
            min: Some(0.001),
            max: None,
        },
        default: "1",
    },
];

const IMAGE_SCHEMA: &[PropertyField] = &[
    COLOR,
    PropertyField {
        key: "source",
        caption: "Source",
        kind: PropertyKind::Text,
        default: "",
    },
];

const CAMERA_SCHEMA: &[PropertyField] = &[PropertyField {
    default: "#607D8B",
    ..COLOR
}];

const THERMOMETER_SCHEMA: &[PropertyField] = &[
    PropertyField {
        default: "#F44336",
        ..COLOR
    },
    PropertyField {
        key: "min",
        caption: "Minimum",
        kind: PropertyKind::Number {
            min: None,
            max: None,
        },
        default: "0",
    },
    PropertyField {
        key: "max",
        caption: "Maximum",
        kind: PropertyKind::Number {
            min: None,
            max: None,
        },
        default: "100",
    },
    PropertyField {
        key: "unit",
        caption: "Unit",
        kind: PropertyKind::Text,
        default: "°C",
    },
];

/// Descriptors for every built-in widget type, in palette order.
pub fn builtin_descriptors() -> Vec<WidgetDescriptor> {
    vec![
        WidgetDescriptor {
            type_tag: WidgetType::Button,
            default_size: (6, 3),
            min_size: MIN_SIZE,
            label_prefix: "button",
            property_schema: BUTTON_SCHEMA,
            render: render_button,
            on_property_edit: edit_button,
            on_runtime_input: input_button,
            on_message: ignore_message,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Switch,
            default_size: (5, 5),
            min_size: MIN_SIZE,
            label_prefix: "switch",
            property_schema: SWITCH_SCHEMA,
            render: |_| WidgetContent::Switch { on: false },
            on_property_edit: keep_content,
            on_runtime_input: input_switch,
            on_message: message_switch,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Led,
            default_size: (4, 4),
            min_size: MIN_SIZE,
            label_prefix: "led",
            property_schema: LED_SCHEMA,
            render: |_| WidgetContent::Led { lit: false },
            on_property_edit: keep_content,
            on_runtime_input: ignore_input,
            on_message: message_led,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Text,
            default_size: (8, 3),
            min_size: MIN_SIZE,
            label_prefix: "txt",
            property_schema: TEXT_SCHEMA,
            render: render_text,
            on_property_edit: edit_text,
            on_runtime_input: ignore_input,
            on_message: message_text,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Slider,
            default_size: (8, 5),
            min_size: MIN_SIZE,
            label_prefix: "slider",
            property_schema: SLIDER_SCHEMA,
            render: render_slider,
            on_property_edit: edit_slider,
            on_runtime_input: input_slider,
            on_message: message_slider,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Image,
            default_size: (5, 5),
            min_size: MIN_SIZE,
            label_prefix: "img",
            property_schema: IMAGE_SCHEMA,
            render: |widget| WidgetContent::Image {
                source: widget.property("source").to_string(),
            },
            on_property_edit: edit_image,
            on_runtime_input: ignore_input,
            on_message: message_image,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Camera,
            default_size: (6, 5),
            min_size: MIN_SIZE,
            label_prefix: "cam",
            property_schema: CAMERA_SCHEMA,
            render: |_| WidgetContent::Camera {
                frames: 0,
                last_frame_bytes: 0,
            },
            on_property_edit: keep_content,
            on_runtime_input: ignore_input,
            on_message: message_camera,
        },
        WidgetDescriptor {
            type_tag: WidgetType::Thermometer,
            default_size: (8, 5),
            min_size: MIN_SIZE,
            label_prefix: "temp",
            property_schema: THERMOMETER_SCHEMA,
            render: render_thermometer,
            on_property_edit: edit_thermometer,
            on_runtime_input: ignore_input,
            on_message: message_thermometer,
        },
    ]
}

/// Interprets the shared on/off vocabulary (`1`/`on`/`true`, `0`/`off`/`false`).
pub fn parse_switch_payload(payload: &str) -> Option<bool> {
    let payload = payload.trim();
    if ["1", "on", "true"]
        .iter()
        .any(|word| payload.eq_ignore_ascii_case(word))
    {
        Some(true)
    } else if ["0", "off", "false"]
        .iter()
        .any(|word| payload.eq_ignore_ascii_case(word))
    {
        Some(false)
    } else {
        None
    }
}

/// Formats a number without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn number_property(widget: &Widget, key: &str, fallback: f64) -> f64 {
    widget
        .property(key)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

/// Orders a possibly inverted range so clamping never panics.
fn ordered(min: f64, max: f64) -> (f64, f64) {
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

fn publish_to(widget: &Widget, payload: &str) -> Vec<Publish> {
    if widget.topic.is_empty() {
        return Vec::new();
    }
    vec![Publish {
        topic: widget.topic.clone(),
        payload: payload.to_string(),
    }]
}

fn keep_content(_: &Widget, _: &mut WidgetContent) {}

fn ignore_input(_: &Widget, _: &mut WidgetContent, _: Interaction) -> Vec<Publish> {
    Vec::new()
}

fn ignore_message(_: &Widget, _: &mut WidgetContent, _: &str) -> bool {
    false
}

// Button

fn button_caption(widget: &Widget) -> String {
    match widget.property("text") {
        "" => "PUSH".to_string(),
        text => text.to_string(),
    }
}

fn render_button(widget: &Widget) -> WidgetContent {
    WidgetContent::Button {
        caption: button_caption(widget),
        pressed: false,
    }
}

fn edit_button(widget: &Widget, content: &mut WidgetContent) {
    if let WidgetContent::Button { caption, .. } = content {
        *caption = button_caption(widget);
    }
}

fn input_button(widget: &Widget, content: &mut WidgetContent, input: Interaction) -> Vec<Publish> {
    let WidgetContent::Button { pressed, .. } = content else {
        return Vec::new();
    };
    match input {
        Interaction::Press { .. } => {
            *pressed = true;
            publish_to(widget, widget.property("payload"))
        }
        Interaction::Release if *pressed => {
            *pressed = false;
            if widget.property("trigger_mode") == "hold" {
                publish_to(widget, widget.property("payload_release"))
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

// Switch

fn input_switch(widget: &Widget, content: &mut WidgetContent, input: Interaction) -> Vec<Publish> {
    let WidgetContent::Switch { on } = content else {
        return Vec::new();
    };
    if !matches!(input, Interaction::Press { .. }) {
        return Vec::new();
    }
    *on = !*on;
    let key = if *on { "payload_on" } else { "payload_off" };
    publish_to(widget, widget.property(key))
}

fn message_switch(widget: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Switch { on } = content else {
        return false;
    };
    let trimmed = payload.trim();
    let state = if !widget.property("payload_on").is_empty()
        && trimmed.eq_ignore_ascii_case(widget.property("payload_on"))
    {
        Some(true)
    } else if !widget.property("payload_off").is_empty()
        && trimmed.eq_ignore_ascii_case(widget.property("payload_off"))
    {
        Some(false)
    } else {
        parse_switch_payload(trimmed)
    };
    match state {
        Some(state) if state != *on => {
            *on = state;
            true
        }
        _ => false,
    }
}

// LED

fn message_led(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Led { lit } = content else {
        return false;
    };
    match parse_switch_payload(payload) {
        Some(state) if state != *lit => {
            *lit = state;
            true
        }
        _ => false,
    }
}

// Text

fn render_text(widget: &Widget) -> WidgetContent {
    WidgetContent::Text {
        value: None,
        unit: widget.property("unit").to_string(),
    }
}

fn edit_text(widget: &Widget, content: &mut WidgetContent) {
    if let WidgetContent::Text { unit, .. } = content {
        *unit = widget.property("unit").to_string();
    }
}

fn message_text(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Text { value, .. } = content else {
        return false;
    };
    *value = Some(payload.to_string());
    true
}

// Slider

fn slider_range(widget: &Widget) -> (f64, f64, f64) {
    let (min, max) = ordered(
        number_property(widget, "min", 0.0),
        number_property(widget, "max", 100.0),
    );
    let step = number_property(widget, "step", 1.0);
    let step = if step > 0.0 { step } else { 1.0 };
    (min, max, step)
}

/// Snaps `value` onto the step grid anchored at `min`, then clamps to the range.
fn quantize(value: f64, min: f64, max: f64, step: f64) -> f64 {
    let steps = ((value - min) / step).round();
    (min + steps * step).clamp(min, max)
}

fn render_slider(widget: &Widget) -> WidgetContent {
    let (min, max, step) = slider_range(widget);
    WidgetContent::Slider {
        value: min,
        min,
        max,
        step,
    }
}

fn edit_slider(widget: &Widget, content: &mut WidgetContent) {
    if let WidgetContent::Slider {
        value,
        min,
        max,
        step,
    } = content
    {
        (*min, *max, *step) = slider_range(widget);
        *value = quantize(*value, *min, *max, *step);
    }
}

fn input_slider(widget: &Widget, content: &mut WidgetContent, input: Interaction) -> Vec<Publish> {
    let WidgetContent::Slider {
        value,
        min,
        max,
        step,
    } = content
    else {
        return Vec::new();
    };
    match input {
        Interaction::Press { fraction } | Interaction::Drag { fraction } => {
            let fraction = f64::from(fraction.clamp(0.0, 1.0));
            *value = quantize(*min + fraction * (*max - *min), *min, *max, *step);
            Vec::new()
        }
        Interaction::Release => publish_to(widget, &format_number(*value)),
    }
}

fn message_slider(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Slider {
        value,
        min,
        max,
        step,
    } = content
    else {
        return false;
    };
    match payload.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => {
            *value = quantize(number, *min, *max, *step);
            true
        }
        _ => false,
    }
}

// Image

fn edit_image(widget: &Widget, content: &mut WidgetContent) {
    if let WidgetContent::Image { source } = content {
        *source = widget.property("source").to_string();
    }
}

fn message_image(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Image { source } = content else {
        return false;
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == source.as_str() {
        return false;
    }
    *source = payload.to_string();
    true
}

// Camera

fn message_camera(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Camera {
        frames,
        last_frame_bytes,
    } = content
    else {
        return false;
    };
    *frames += 1;
    *last_frame_bytes = payload.len();
    true
}

// Thermometer

fn render_thermometer(widget: &Widget) -> WidgetContent {
    let (min, max) = ordered(
        number_property(widget, "min", 0.0),
        number_property(widget, "max", 100.0),
    );
    WidgetContent::Thermometer {
        reading: None,
        min,
        max,
        unit: widget.property("unit").to_string(),
    }
}

fn edit_thermometer(widget: &Widget, content: &mut WidgetContent) {
    if let WidgetContent::Thermometer {
        reading,
        min,
        max,
        unit,
    } = content
    {
        (*min, *max) = ordered(
            number_property(widget, "min", 0.0),
            number_property(widget, "max", 100.0),
        );
        *unit = widget.property("unit").to_string();
        *reading = reading.map(|r| r.clamp(*min, *max));
    }
}

fn message_thermometer(_: &Widget, content: &mut WidgetContent, payload: &str) -> bool {
    let WidgetContent::Thermometer {
        reading, min, max, ..
    } = content
    else {
        return false;
    };
    match payload.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => {
            *reading = Some(number.clamp(*min, *max));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WidgetRegistry;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn widget(ty: WidgetType, props: &[(&str, &str)]) -> Widget {
        let registry = WidgetRegistry::default();
        let descriptor = registry.get(ty).unwrap();
        let mut properties: BTreeMap<String, String> = descriptor
            .property_schema
            .iter()
            .map(|f| (f.key.to_string(), f.default.to_string()))
            .collect();
        for (k, v) in props {
            properties.insert(k.to_string(), v.to_string());
        }
        Widget {
            id: Uuid::new_v4(),
            type_tag: ty,
            type_local_index: 1,
            position: (0, 0),
            size: descriptor.default_size,
            label: format!("{} 1", ty.tag()),
            topic: format!("panelcraft/{}/1", ty.tag().to_lowercase()),
            properties,
        }
    }

    fn descriptor(ty: WidgetType) -> WidgetDescriptor {
        WidgetRegistry::default().get(ty).cloned().unwrap()
    }

    #[test]
    fn test_switch_vocabulary() {
        assert_eq!(parse_switch_payload("ON"), Some(true));
        assert_eq!(parse_switch_payload(" true "), Some(true));
        assert_eq!(parse_switch_payload("1"), Some(true));
        assert_eq!(parse_switch_payload("Off"), Some(false));
        assert_eq!(parse_switch_payload("0"), Some(false));
        assert_eq!(parse_switch_payload("maybe"), None);
    }

    #[test]
    fn test_button_tap_and_hold() {
        let d = descriptor(WidgetType::Button);
        let tap = widget(WidgetType::Button, &[]);
        let mut content = (d.render)(&tap);
        let sent = (d.on_runtime_input)(&tap, &mut content, Interaction::Press { fraction: 0.5 });
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, "1");
        assert!((d.on_runtime_input)(&tap, &mut content, Interaction::Release).is_empty());

        let hold = widget(WidgetType::Button, &[("trigger_mode", "hold")]);
        let mut content = (d.render)(&hold);
        (d.on_runtime_input)(&hold, &mut content, Interaction::Press { fraction: 0.5 });
        let sent = (d.on_runtime_input)(&hold, &mut content, Interaction::Release);
        assert_eq!(sent[0].payload, "0");
        assert_eq!(
            content,
            WidgetContent::Button {
                caption: "PUSH".into(),
                pressed: false
            }
        );
    }

    #[test]
    fn test_unbound_widgets_do_not_publish() {
        let d = descriptor(WidgetType::Switch);
        let mut w = widget(WidgetType::Switch, &[]);
        w.topic.clear();
        let mut content = (d.render)(&w);
        assert!((d.on_runtime_input)(&w, &mut content, Interaction::Press { fraction: 0.0 }).is_empty());
        assert_eq!(content, WidgetContent::Switch { on: true });
    }

    #[test]
    fn test_switch_toggles_and_follows_messages() {
        let d = descriptor(WidgetType::Switch);
        let w = widget(WidgetType::Switch, &[]);
        let mut content = (d.render)(&w);

        let sent = (d.on_runtime_input)(&w, &mut content, Interaction::Press { fraction: 0.0 });
        assert_eq!(sent[0].payload, "ON");
        let sent = (d.on_runtime_input)(&w, &mut content, Interaction::Press { fraction: 0.0 });
        assert_eq!(sent[0].payload, "OFF");

        assert!((d.on_message)(&w, &mut content, "on"));
        assert_eq!(content, WidgetContent::Switch { on: true });
        assert!(!(d.on_message)(&w, &mut content, "garbage"));
        assert!((d.on_message)(&w, &mut content, "false"));
        assert_eq!(content, WidgetContent::Switch { on: false });
    }

    #[test]
    fn test_led_lights_on_vocabulary() {
        let d = descriptor(WidgetType::Led);
        let w = widget(WidgetType::Led, &[]);
        let mut content = (d.render)(&w);
        assert!((d.on_message)(&w, &mut content, "1"));
        assert_eq!(content, WidgetContent::Led { lit: true });
        assert!(!(d.on_message)(&w, &mut content, "42"));
        assert_eq!(content, WidgetContent::Led { lit: true });
    }

    #[test]
    fn test_slider_quantizes_and_publishes_on_release() {
        let d = descriptor(WidgetType::Slider);
        let w = widget(WidgetType::Slider, &[("step", "5")]);
        let mut content = (d.render)(&w);
        assert!((d.on_runtime_input)(&w, &mut content, Interaction::Press { fraction: 0.42 }).is_empty());
        (d.on_runtime_input)(&w, &mut content, Interaction::Drag { fraction: 0.47 });
        let sent = (d.on_runtime_input)(&w, &mut content, Interaction::Release);
        assert_eq!(sent[0].payload, "45");

        assert!((d.on_message)(&w, &mut content, "250"));
        assert!(matches!(content, WidgetContent::Slider { value, .. } if value == 100.0));
        assert!(!(d.on_message)(&w, &mut content, "abc"));
    }

    #[test]
    fn test_slider_tolerates_inverted_range() {
        let d = descriptor(WidgetType::Slider);
        let w = widget(WidgetType::Slider, &[("min", "50"), ("max", "10")]);
        let mut content = (d.render)(&w);
        assert!((d.on_message)(&w, &mut content, "0"));
        assert!(matches!(content, WidgetContent::Slider { value, .. } if value == 10.0));
    }

    #[test]
    fn test_property_edit_updates_existing_content() {
        let d = descriptor(WidgetType::Text);
        let mut w = widget(WidgetType::Text, &[]);
        let mut content = (d.render)(&w);
        (d.on_message)(&w, &mut content, "21.5");
        w.properties.insert("unit".into(), "kW".into());
        (d.on_property_edit)(&w, &mut content);
        assert_eq!(
            content,
            WidgetContent::Text {
                value: Some("21.5".into()),
                unit: "kW".into()
            }
        );
    }

    #[test]
    fn test_thermometer_and_camera_messages() {
        let d = descriptor(WidgetType::Thermometer);
        let w = widget(WidgetType::Thermometer, &[]);
        let mut content = (d.render)(&w);
        assert!((d.on_message)(&w, &mut content, "-12"));
        assert!(matches!(content, WidgetContent::Thermometer { reading: Some(r), .. } if r == 0.0));

        let d = descriptor(WidgetType::Camera);
        let w = widget(WidgetType::Camera, &[]);
        let mut content = (d.render)(&w);
        (d.on_message)(&w, &mut content, "abcd");
        (d.on_message)(&w, &mut content, "xy");
        assert_eq!(
            content,
            WidgetContent::Camera {
                frames: 2,
                last_frame_bytes: 2
            }
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(45.0), "45");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }
}
