//! Built-in sample dashboards that can be quickly loaded from the UI.
//!
//! Each sample wires a few widgets to shared topics so run mode does
//! something visible over the loopback transport straight away.

use crate::registry::{WidgetRegistry, TOPIC_KEY};
use crate::scene::Scene;
use crate::types::{Dashboard, ProjectSettings, WidgetType};

/// Kinds of built-in samples available from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Light switch, lamp, dimmer and a temperature readout
    LivingRoom,
    /// Buttons and an LED bank for a bench power supply
    LabBench,
    /// A camera feed with a snapshot trigger and a status line
    Greenhouse,
}

/// Metadata for a single sample.
pub struct SampleInfo {
    /// Stable identifier for the sample
    pub kind: SampleKind,
    /// Human-friendly display name
    pub name: &'static str,
}

/// Returns all samples with their display names.
pub const fn all_samples() -> &'static [SampleInfo] {
    const SAMPLES: &[SampleInfo] = &[
        SampleInfo {
            kind: SampleKind::LivingRoom,
            name: "Living room",
        },
        SampleInfo {
            kind: SampleKind::LabBench,
            name: "Lab bench",
        },
        SampleInfo {
            kind: SampleKind::Greenhouse,
            name: "Greenhouse",
        },
    ];
    SAMPLES
}

/// Builds the dashboard for the given sample kind.
pub fn build_sample(kind: SampleKind) -> Dashboard {
    match kind {
        SampleKind::LivingRoom => build_living_room(),
        SampleKind::LabBench => build_lab_bench(),
        SampleKind::Greenhouse => build_greenhouse(),
    }
}

/// Places `(type, x, y, topic override, extra properties)` rows into a scene.
fn assemble(
    name: &str,
    base_topic: &str,
    rows: &[(WidgetType, u32, u32, Option<&str>, &[(&str, &str)])],
) -> Dashboard {
    let registry = WidgetRegistry::with_builtin_types();
    let mut scene = Scene::new(base_topic);
    for (type_tag, x, y, topic, properties) in rows {
        let Some(id) = scene.place_widget(&registry, *type_tag, *x, *y) else {
            continue;
        };
        if let Some(topic) = topic {
            scene.set_property(id, TOPIC_KEY, &format!("{base_topic}/{topic}"));
        }
        for (key, value) in properties.iter() {
            scene.set_property(id, key, value);
        }
    }
    Dashboard {
        project: ProjectSettings {
            name: name.to_string(),
            base_topic: base_topic.to_string(),
            ..ProjectSettings::default()
        },
        widgets: scene.widgets().to_vec(),
        ..Dashboard::default()
    }
}

fn build_living_room() -> Dashboard {
    assemble(
        "Living room",
        "home/living",
        &[
            (WidgetType::Switch, 1, 1, Some("lamp"), &[("label", "Lamp")]),
            (WidgetType::Led, 7, 1, Some("lamp"), &[("label", "Lamp state")]),
            (
                WidgetType::Slider,
                1,
                7,
                Some("dimmer"),
                &[("label", "Dimmer"), ("step", "5")],
            ),
            (WidgetType::Text, 1, 13, Some("dimmer"), &[("unit", "%")]),
            (
                WidgetType::Thermometer,
                12,
                1,
                Some("temperature"),
                &[("min", "-10"), ("max", "40")],
            ),
        ],
    )
}

fn build_lab_bench() -> Dashboard {
    assemble(
        "Lab bench",
        "lab/psu",
        &[
            (
                WidgetType::Button,
                1,
                1,
                Some("output"),
                &[("text", "ON"), ("payload", "on")],
            ),
            (
                WidgetType::Button,
                8,
                1,
                Some("output"),
                &[("text", "OFF"), ("payload", "off"), ("color", "#F44336")],
            ),
            (WidgetType::Led, 15, 1, Some("output"), &[("label", "Output")]),
            (
                WidgetType::Button,
                1,
                5,
                Some("trigger"),
                &[("text", "PULSE"), ("trigger_mode", "hold")],
            ),
            (WidgetType::Led, 8, 5, Some("trigger"), &[("label", "Trigger")]),
            (
                WidgetType::Slider,
                1,
                10,
                Some("voltage"),
                &[("label", "Voltage"), ("max", "30"), ("step", "0.5")],
            ),
            (WidgetType::Text, 10, 10, Some("voltage"), &[("unit", "V")]),
        ],
    )
}

fn build_greenhouse() -> Dashboard {
    assemble(
        "Greenhouse",
        "greenhouse",
        &[
            (WidgetType::Camera, 1, 1, None, &[("label", "Bench cam")]),
            (
                WidgetType::Button,
                1,
                7,
                Some("camera/1"),
                &[("text", "SNAP"), ("payload", "frame")],
            ),
            (WidgetType::Image, 8, 1, None, &[("label", "Last plot")]),
            (WidgetType::Thermometer, 14, 1, None, &[]),
            (
                WidgetType::Switch,
                14,
                7,
                Some("fan"),
                &[("label", "Fan"), ("payload_on", "1"), ("payload_off", "0")],
            ),
            (WidgetType::Text, 1, 11, Some("fan"), &[("label", "Fan state")]),
        ],
    )
}
