//! Arduino sketch export.
//!
//! Generates an ESP32 sketch (WiFi + PubSubClient) that plays the device side
//! of a dashboard: it subscribes to the topics that buttons, switches and
//! sliders publish on, and publishes the values that LEDs, text fields and
//! thermometers display. A mapping table at the top of the sketch lists each
//! widget's label, type, topic and firmware variable.

use super::file_ops::file_stem;
use super::state::DashboardApp;
use crate::registry::WidgetRegistry;
use crate::types::{Dashboard, Widget, WidgetType};
use crate::widgets::format_number;
use std::fmt::Write as _;

/// Milliseconds between two rounds of status publishes in the generated loop.
const PUBLISH_INTERVAL_MS: u32 = 2000;

impl DashboardApp {
    /// Saves an Arduino sketch for the current dashboard through a save dialog.
    pub fn export_arduino(&mut self, ctx: &eframe::egui::Context) {
        let dashboard = self.session.to_dashboard();
        let sketch = build_arduino_sketch(&dashboard, self.session.registry());
        let file_name = format!("{}.ino", file_stem(&dashboard.project.name));
        self.spawn_export(ctx, "Arduino sketch", "ino", file_name, sketch.into_bytes());
    }

    /// Copies the Arduino sketch for the current dashboard to the clipboard.
    pub fn copy_arduino_sketch(&mut self, ctx: &eframe::egui::Context) {
        let dashboard = self.session.to_dashboard();
        ctx.copy_text(build_arduino_sketch(&dashboard, self.session.registry()));
        log::info!(
            "copied Arduino sketch for {} widgets to the clipboard",
            dashboard.widgets.len()
        );
    }
}

/// One widget as seen by the firmware.
struct SketchEntry<'a> {
    widget: &'a Widget,
    /// Variable holding the widget's value, e.g. `led_2`
    variable: String,
    /// Constant holding the widget's topic, e.g. `TOPIC_LED_2`
    topic_const: String,
}

/// Which way values flow between the board and the dashboard.
enum Role {
    /// The dashboard publishes, the board subscribes
    Command,
    /// The board publishes, the dashboard displays
    Status,
    /// Nothing is generated beyond the mapping row
    Passive,
}

fn role(type_tag: WidgetType) -> Role {
    match type_tag {
        WidgetType::Button | WidgetType::Switch | WidgetType::Slider => Role::Command,
        WidgetType::Led | WidgetType::Text | WidgetType::Thermometer => Role::Status,
        WidgetType::Image | WidgetType::Camera => Role::Passive,
    }
}

/// Builds an Arduino sketch that talks to the dashboard over MQTT.
///
/// Firmware names come from each type's label prefix and the widget's
/// type-local index, so `LED 2` becomes `led_2` with topic constant
/// `TOPIC_LED_2`.
///
/// # Arguments
///
/// * `dashboard` - The dashboard to generate firmware for
/// * `registry` - Supplies the label prefix of every widget type
///
/// # Returns
///
/// The sketch source, ready to be saved as an `.ino` file.
pub fn build_arduino_sketch(dashboard: &Dashboard, registry: &WidgetRegistry) -> String {
    let entries: Vec<SketchEntry> = dashboard
        .widgets
        .iter()
        .map(|widget| {
            let prefix = registry
                .get(widget.type_tag)
                .map(|descriptor| descriptor.label_prefix.to_string())
                .unwrap_or_else(|| widget.type_tag.tag().to_lowercase());
            let variable = format!("{}_{}", identifier(&prefix), widget.type_local_index);
            SketchEntry {
                widget,
                topic_const: format!("TOPIC_{}", variable.to_uppercase()),
                variable,
            }
        })
        .collect();

    let project = &dashboard.project;
    let mut out = String::new();
    let _ = writeln!(out, "/*");
    let _ = writeln!(out, " * Panel Craft sketch for \"{}\"", comment_text(&project.name));
    let _ = writeln!(out, " * Board: ESP32 with the PubSubClient library");
    let _ = writeln!(out, " */");
    let _ = writeln!(out);
    let _ = writeln!(out, "#include <WiFi.h>");
    let _ = writeln!(out, "#include <PubSubClient.h>");
    let _ = writeln!(out);
    let _ = writeln!(out, "const char* WIFI_SSID = \"YOUR_WIFI_SSID\";");
    let _ = writeln!(out, "const char* WIFI_PASSWORD = \"YOUR_WIFI_PASSWORD\";");
    let _ = writeln!(out, "const char* MQTT_BROKER = \"{}\";", c_string(&project.broker));
    let _ = writeln!(out, "const int MQTT_PORT = {};", project.port);
    let _ = writeln!(out, "const char* MQTT_CLIENT_ID = \"{}\";", c_string(&device_client_id(&project.client_id)));
    let _ = writeln!(out);

    write_mapping_table(&mut out, &entries);

    for entry in &entries {
        let _ = writeln!(
            out,
            "const char* {} = \"{}\";",
            entry.topic_const,
            c_string(&entry.widget.topic)
        );
    }
    if !entries.is_empty() {
        let _ = writeln!(out);
    }
    for entry in &entries {
        if let Some(declaration) = declaration(entry) {
            let _ = writeln!(out, "{declaration}");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "WiFiClient wifiClient;");
    let _ = writeln!(out, "PubSubClient mqtt(wifiClient);");
    let _ = writeln!(out, "unsigned long lastPublish = 0;");
    let _ = writeln!(out);

    // Receiver
    let _ = writeln!(out, "void onMessage(char* topic, byte* payload, unsigned int length) {{");
    let _ = writeln!(out, "  String msg;");
    let _ = writeln!(out, "  for (unsigned int i = 0; i < length; i++) msg += (char)payload[i];");
    let _ = writeln!(out, "  String t(topic);");
    for entry in entries.iter().filter(|e| matches!(role(e.widget.type_tag), Role::Command)) {
        let _ = writeln!(out, "  if (t == {}) {{", entry.topic_const);
        let _ = writeln!(out, "    {}", receive_statement(entry));
        let _ = writeln!(
            out,
            "    Serial.print(\"[{}] \"); Serial.println(msg);",
            c_string(&entry.widget.label)
        );
        let _ = writeln!(out, "  }}");
    }
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    // Connection and subscriptions
    let _ = writeln!(out, "void connectMqtt() {{");
    let _ = writeln!(out, "  while (!mqtt.connected()) {{");
    let _ = writeln!(out, "    if (mqtt.connect(MQTT_CLIENT_ID)) {{");
    for entry in entries.iter().filter(|e| matches!(role(e.widget.type_tag), Role::Command)) {
        let _ = writeln!(out, "      mqtt.subscribe({});", entry.topic_const);
    }
    let _ = writeln!(out, "    }} else {{");
    let _ = writeln!(out, "      delay(2000);");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "  }}");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let _ = writeln!(out, "void setup() {{");
    let _ = writeln!(out, "  Serial.begin(115200);");
    let _ = writeln!(out, "  WiFi.begin(WIFI_SSID, WIFI_PASSWORD);");
    let _ = writeln!(out, "  while (WiFi.status() != WL_CONNECTED) delay(500);");
    let _ = writeln!(out, "  mqtt.setServer(MQTT_BROKER, MQTT_PORT);");
    let _ = writeln!(out, "  mqtt.setCallback(onMessage);");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);

    let _ = writeln!(out, "void loop() {{");
    let _ = writeln!(out, "  if (!mqtt.connected()) connectMqtt();");
    let _ = writeln!(out, "  mqtt.loop();");
    let _ = writeln!(out, "  if (millis() - lastPublish < {PUBLISH_INTERVAL_MS}) return;");
    let _ = writeln!(out, "  lastPublish = millis();");
    for entry in &entries {
        if let Some(statement) = publish_statement(entry) {
            let _ = writeln!(out, "  {statement}");
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn write_mapping_table(out: &mut String, entries: &[SketchEntry]) {
    let _ = writeln!(out, "/*");
    let _ = writeln!(out, " [Mapping Table]");
    let _ = writeln!(out, " Label | Type | Topic | Variable");
    let _ = writeln!(out, " --------------------------------------------------");
    for entry in entries {
        let _ = writeln!(
            out,
            " {} | {} | {} | {}",
            comment_text(&entry.widget.label),
            entry.widget.type_tag,
            comment_text(&entry.widget.topic),
            entry.variable
        );
    }
    let _ = writeln!(out, "*/");
    let _ = writeln!(out);
}

fn declaration(entry: &SketchEntry) -> Option<String> {
    let name = &entry.variable;
    let widget = entry.widget;
    let line = match widget.type_tag {
        WidgetType::Button | WidgetType::Text => format!("String {name} = \"\";"),
        WidgetType::Switch | WidgetType::Led => format!("bool {name} = false;"),
        WidgetType::Slider => format!("float {name} = {};", float_literal(widget, "min")),
        WidgetType::Thermometer => format!("float {name} = {};", float_literal(widget, "min")),
        WidgetType::Image | WidgetType::Camera => return None,
    };
    Some(line)
}

fn receive_statement(entry: &SketchEntry) -> String {
    let name = &entry.variable;
    match entry.widget.type_tag {
        WidgetType::Switch => {
            let on = match entry.widget.property("payload_on") {
                "" => "ON",
                payload => payload,
            };
            format!("{name} = msg.equalsIgnoreCase(\"{}\");", c_string(on))
        }
        WidgetType::Slider => format!("{name} = msg.toFloat();"),
        _ => format!("{name} = msg;"),
    }
}

fn publish_statement(entry: &SketchEntry) -> Option<String> {
    let (name, topic) = (&entry.variable, &entry.topic_const);
    match entry.widget.type_tag {
        WidgetType::Led => Some(format!("mqtt.publish({topic}, {name} ? \"ON\" : \"OFF\");")),
        WidgetType::Text => Some(format!(
            "if ({name}.length() > 0) mqtt.publish({topic}, {name}.c_str());"
        )),
        WidgetType::Thermometer => Some(format!(
            "mqtt.publish({topic}, String({name}, 1).c_str());"
        )),
        WidgetType::Camera => Some(format!("// {name}: publish camera frames to {topic}")),
        _ => None,
    }
}

/// Numeric property as a C float literal, `0.0` when unset or invalid.
fn float_literal(widget: &Widget, key: &str) -> String {
    let value = widget.property(key).trim().parse::<f64>().unwrap_or(0.0);
    let text = format_number(value);
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Distinct client id for the board so it does not kick the dashboard off
/// the broker.
fn device_client_id(client_id: &str) -> String {
    match client_id.trim() {
        "" => "panelcraft-device".to_string(),
        id => format!("{id}-device"),
    }
}

fn identifier(input: &str) -> String {
    let mut out: String = input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|ch: char| ch.is_ascii_digit()) {
        out.insert(0, 'w');
    }
    out
}

fn c_string(input: &str) -> String {
    let mut s = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => s.push_str("\\\\"),
            '"' => s.push_str("\\\""),
            '\n' => s.push_str("\\n"),
            '\r' => {}
            _ => s.push(ch),
        }
    }
    s
}

/// Text safe to place inside a `/* */` comment on a single line.
fn comment_text(input: &str) -> String {
    input.replace("*/", "* /").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    fn dashboard(rows: &[(WidgetType, u32)]) -> Dashboard {
        let registry = WidgetRegistry::with_builtin_types();
        let mut scene = Scene::new("home");
        for (type_tag, x) in rows {
            scene.place_widget(&registry, *type_tag, *x, 0);
        }
        let mut dashboard = Dashboard::new();
        dashboard.project.name = "Test".to_string();
        dashboard.widgets = scene.widgets().to_vec();
        dashboard
    }

    #[test]
    fn mapping_table_lists_every_widget_with_its_variable() {
        let mut dashboard = dashboard(&[
            (WidgetType::Led, 0),
            (WidgetType::Button, 4),
            (WidgetType::Led, 8),
            (WidgetType::Thermometer, 12),
        ]);
        dashboard.widgets[1].label = "Door".to_string();
        let registry = WidgetRegistry::with_builtin_types();
        let sketch = build_arduino_sketch(&dashboard, &registry);

        let table: Vec<&str> = sketch
            .lines()
            .skip_while(|line| !line.contains("[Mapping Table]"))
            .skip(3)
            .take_while(|line| *line != "*/")
            .collect();
        assert_eq!(
            table,
            vec![
                " LED 1 | LED | home/led/1 | led_1",
                " Door | BUTTON | home/button/1 | button_1",
                " LED 2 | LED | home/led/2 | led_2",
                " THERMOMETER 1 | THERMOMETER | home/thermometer/1 | temp_1",
            ]
        );
    }

    #[test]
    fn commands_are_subscribed_and_statuses_published() {
        let mut dashboard = dashboard(&[
            (WidgetType::Switch, 0),
            (WidgetType::Slider, 4),
            (WidgetType::Led, 8),
            (WidgetType::Image, 12),
        ]);
        let registry = WidgetRegistry::with_builtin_types();
        dashboard.widgets[2].topic = "porch/\"light\"".to_string();
        dashboard.project.broker = "broker.local".to_string();
        dashboard.project.client_id = "panel".to_string();
        let sketch = build_arduino_sketch(&dashboard, &registry);

        assert!(sketch.contains("const char* MQTT_BROKER = \"broker.local\";"));
        assert!(sketch.contains("const char* MQTT_CLIENT_ID = \"panel-device\";"));
        assert!(sketch.contains("mqtt.subscribe(TOPIC_SWITCH_1);"));
        assert!(sketch.contains("mqtt.subscribe(TOPIC_SLIDER_1);"));
        assert!(!sketch.contains("mqtt.subscribe(TOPIC_LED_1);"));
        assert!(sketch.contains("switch_1 = msg.equalsIgnoreCase(\"ON\");"));
        assert!(sketch.contains("float slider_1 = 0.0;"));
        assert!(sketch.contains("mqtt.publish(TOPIC_LED_1, led_1 ? \"ON\" : \"OFF\");"));
        assert!(sketch.contains("const char* TOPIC_LED_1 = \"porch/\\\"light\\\"\";"));
        assert!(sketch.contains("const char* TOPIC_IMG_1 ="));
        assert!(!sketch.contains("img_1 ="));
    }

    #[test]
    fn empty_dashboard_still_yields_a_sketch() {
        let registry = WidgetRegistry::with_builtin_types();
        let sketch = build_arduino_sketch(&Dashboard::new(), &registry);
        assert!(sketch.contains("void setup()"));
        assert!(sketch.contains("void loop()"));
        assert!(sketch.contains("const char* MQTT_CLIENT_ID = \""));
    }

    #[test]
    fn labels_cannot_close_the_table_comment() {
        let mut dashboard = dashboard(&[(WidgetType::Text, 0)]);
        dashboard.widgets[0].label = "a */ b".to_string();
        dashboard.widgets[0].topic = "home/status".to_string();

        let sketch = build_arduino_sketch(&dashboard, &WidgetRegistry::with_builtin_types());
        assert!(sketch.contains(" a * / b | TEXT | home/status | txt_1"));
    }
}
