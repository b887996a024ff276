//! Measurement configuration and alert toggle.

use serde::Deserialize;

use crate::error::{CallTallyError, Result};

/// Whether a failure should raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    #[default]
    On,
    Off,
}

impl Toggle {
    /// Resolve to the configured tag value.
    pub fn text<'a>(self, toggle_on: &'a str, toggle_off: &'a str) -> &'a str {
        match self {
            Toggle::On => toggle_on,
            Toggle::Off => toggle_off,
        }
    }
}

/// Meter names, tag keys and tag values used by the measurement wrapper.
///
/// Construct once at startup and share through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasureConfig {
    #[serde(default = "default_increment_meter_name")]
    pub increment_meter_name: String,
    #[serde(default = "default_measure_meter_name")]
    pub measure_meter_name: String,
    #[serde(default = "default_measure_timer_suffix")]
    pub measure_timer_suffix: String,

    #[serde(default = "default_event_tag")]
    pub event_tag: String,
    #[serde(default = "default_method_tag")]
    pub method_tag: String,
    #[serde(default = "default_type_tag")]
    pub type_tag: String,
    #[serde(default = "default_alert_tag")]
    pub alert_tag: String,

    #[serde(default = "default_success_value")]
    pub success_type_tag_value: String,
    #[serde(default = "default_failure_value")]
    pub failure_type_tag_value: String,

    #[serde(default = "default_toggle_on")]
    pub toggle_on_tag_value: String,
    #[serde(default = "default_toggle_off")]
    pub toggle_off_tag_value: String,

    /// false selects the two-counter variant without an alert tag.
    #[serde(default = "default_alert_tagging")]
    pub alert_tagging: bool,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            increment_meter_name: default_increment_meter_name(),
            measure_meter_name: default_measure_meter_name(),
            measure_timer_suffix: default_measure_timer_suffix(),
            event_tag: default_event_tag(),
            method_tag: default_method_tag(),
            type_tag: default_type_tag(),
            alert_tag: default_alert_tag(),
            success_type_tag_value: default_success_value(),
            failure_type_tag_value: default_failure_value(),
            toggle_on_tag_value: default_toggle_on(),
            toggle_off_tag_value: default_toggle_off(),
            alert_tagging: default_alert_tagging(),
        }
    }
}

impl MeasureConfig {
    /// Name of the timer paired with a meter.
    pub fn timer_name(&self, meter_name: &str) -> String {
        format!("{}.{}", meter_name, self.measure_timer_suffix)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("increment_meter_name", &self.increment_meter_name),
            ("measure_meter_name", &self.measure_meter_name),
            ("measure_timer_suffix", &self.measure_timer_suffix),
            ("event_tag", &self.event_tag),
            ("method_tag", &self.method_tag),
            ("type_tag", &self.type_tag),
            ("alert_tag", &self.alert_tag),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CallTallyError::BadConfig(format!("measure.{field} must not be empty")));
            }
        }
        if self.success_type_tag_value == self.failure_type_tag_value {
            return Err(CallTallyError::BadConfig(
                "measure success and failure tag values must differ".into(),
            ));
        }
        if self.alert_tagging && self.toggle_on_tag_value == self.toggle_off_tag_value {
            return Err(CallTallyError::BadConfig(
                "measure toggle on and off tag values must differ".into(),
            ));
        }
        Ok(())
    }
}

fn default_increment_meter_name() -> String {
    "event".into()
}
fn default_measure_meter_name() -> String {
    "method".into()
}
fn default_measure_timer_suffix() -> String {
    "timer".into()
}
fn default_event_tag() -> String {
    "event".into()
}
fn default_method_tag() -> String {
    "method".into()
}
fn default_type_tag() -> String {
    "type".into()
}
fn default_alert_tag() -> String {
    "alert".into()
}
fn default_success_value() -> String {
    "successful".into()
}
fn default_failure_value() -> String {
    "failed".into()
}
fn default_toggle_on() -> String {
    "on".into()
}
fn default_toggle_off() -> String {
    "off".into()
}
fn default_alert_tagging() -> bool {
    true
}
