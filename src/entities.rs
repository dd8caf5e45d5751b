//! Sensor and binary sensor descriptions derived from the snapshot.
//!
//! Descriptions are built once from the devices present after the first
//! refresh and read their values from the coordinator on demand, so a
//! description for a device that later disappears simply reports nothing.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::DOMAIN;
use crate::coordinator::Coordinator;
use crate::snapshot::DeviceData;

const MANUFACTURER: &str = "Atlantic";
const RECENT_EVENTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorDeviceClass {
    Temperature,
    Power,
    Energy,
    Duration,
    Humidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStateClass {
    Measurement,
    TotalIncreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySensorDeviceClass {
    Power,
    Running,
    Heat,
    Cold,
    Connectivity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    pub device_class: SensorDeviceClass,
    pub unit: &'static str,
    pub state_class: SensorStateClass,
}

const fn measured(device_class: SensorDeviceClass, unit: &'static str) -> SensorConfig {
    SensorConfig {
        device_class,
        unit,
        state_class: SensorStateClass::Measurement,
    }
}

const fn counter(device_class: SensorDeviceClass, unit: &'static str) -> SensorConfig {
    SensorConfig {
        device_class,
        unit,
        state_class: SensorStateClass::TotalIncreasing,
    }
}

const CELSIUS: &str = "\u{b0}C";

const STATE_SENSOR_CONFIG: &[(&str, SensorConfig)] = &[
    ("core:TemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:TargetTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:ComfortTargetDHWTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:EcoTargetDHWTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:TargetDHWTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:WaterTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:OutdoorTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("io:MiddleWaterTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("io:OutletWaterTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("io:InletWaterTemperatureState", measured(SensorDeviceClass::Temperature, CELSIUS)),
    ("core:ElectricPowerConsumptionState", measured(SensorDeviceClass::Power, "W")),
    ("core:ElectricEnergyConsumptionState", counter(SensorDeviceClass::Energy, "Wh")),
    ("io:ElectricBoosterOperatingTimeState", counter(SensorDeviceClass::Duration, "h")),
    ("io:HeatPumpOperatingTimeState", counter(SensorDeviceClass::Duration, "h")),
    ("core:RelativeHumidityState", measured(SensorDeviceClass::Humidity, "%")),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryStateConfig {
    pub device_class: Option<BinarySensorDeviceClass>,
    /// Compared case-insensitively against the value's text form.
    pub on_values: &'static [&'static str],
}

const DEFAULT_ON_VALUES: &[&str] = &["on", "true", "1"];

const fn binary(
    device_class: Option<BinarySensorDeviceClass>,
    on_values: &'static [&'static str],
) -> BinaryStateConfig {
    BinaryStateConfig {
        device_class,
        on_values,
    }
}

const BINARY_STATE_CONFIG: &[(&str, BinaryStateConfig)] = &[
    ("core:OnOffState", binary(Some(BinarySensorDeviceClass::Power), DEFAULT_ON_VALUES)),
    ("core:BoostOnOffState", binary(Some(BinarySensorDeviceClass::Running), DEFAULT_ON_VALUES)),
    ("core:DHWOnOffState", binary(Some(BinarySensorDeviceClass::Running), DEFAULT_ON_VALUES)),
    ("io:DHWBoostModeState", binary(Some(BinarySensorDeviceClass::Running), DEFAULT_ON_VALUES)),
    ("core:HeatingOnOffState", binary(Some(BinarySensorDeviceClass::Heat), DEFAULT_ON_VALUES)),
    ("core:CoolingOnOffState", binary(Some(BinarySensorDeviceClass::Cold), DEFAULT_ON_VALUES)),
    (
        "io:ElectricBoosterOperatingModeState",
        binary(Some(BinarySensorDeviceClass::Running), &["on", "true", "1", "active"]),
    ),
    ("core:OperatingModeState", binary(None, &["on", "true", "1", "heating", "cooling"])),
    (
        "core:StatusState",
        binary(Some(BinarySensorDeviceClass::Running), &["available", "on", "true", "1"]),
    ),
];

pub fn sensor_config(state_name: &str) -> Option<&'static SensorConfig> {
    STATE_SENSOR_CONFIG
        .iter()
        .find(|(name, _)| *name == state_name)
        .map(|(_, config)| config)
}

pub fn binary_state_config(state_name: &str) -> Option<&'static BinaryStateConfig> {
    BINARY_STATE_CONFIG
        .iter()
        .find(|(name, _)| *name == state_name)
        .map(|(_, config)| config)
}

/// Device URL with its separators turned into underscores.
pub fn safe_device_id(device_url: &str) -> String {
    device_url.replace(['/', ':', '#'], "_")
}

pub fn safe_state_id(state_name: &str) -> String {
    state_name.replace(':', "_")
}

/// `core:TargetDHWTemperatureState` -> `Target D H W Temperature`.
pub fn format_state_name(state_name: &str) -> String {
    let name = state_name.rsplit(':').next().unwrap_or(state_name);
    let mut spaced = String::with_capacity(name.len() + 8);
    for ch in name.chars() {
        if ch.is_uppercase() && !spaced.is_empty() {
            spaced.push(' ');
        }
        spaced.push(ch);
    }
    spaced.replace("State", "").trim().to_string()
}

/// Whether a state's value reads as a boolean.
pub fn looks_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => ["on", "off", "true", "false"].contains(&s.to_lowercase().as_str()),
        _ => false,
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    fn for_device(device: &DeviceData, with_version: bool) -> Self {
        Self {
            identifiers: (DOMAIN.to_string(), device.device_url.clone()),
            name: device.label.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: format!("{} ({})", device.widget, device.ui_class),
            sw_version: with_version.then(|| device.controllable_name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    /// One state of one device.
    State {
        device_url: String,
        state_name: String,
        config: Option<SensorConfig>,
    },
    /// Everything known about one device.
    RawData { device_url: String },
    /// Size and tail of the event log.
    Events,
    /// The coordinator's full dump.
    FullDump,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub unique_id: String,
    pub name: String,
    pub icon: Option<&'static str>,
    pub kind: SensorKind,
}

impl Sensor {
    pub fn state<C>(coordinator: &Coordinator<C>, device_url: &str, state_name: &str) -> Self {
        let label = device_label(coordinator, device_url);
        Self {
            unique_id: format!("{}_{}", safe_device_id(device_url), safe_state_id(state_name)),
            name: format!("{label} {}", format_state_name(state_name)),
            icon: None,
            kind: SensorKind::State {
                device_url: device_url.to_string(),
                state_name: state_name.to_string(),
                config: sensor_config(state_name).copied(),
            },
        }
    }

    pub fn raw_data<C>(coordinator: &Coordinator<C>, device_url: &str) -> Self {
        let label = device_label(coordinator, device_url);
        Self {
            unique_id: format!("{}_raw_data", safe_device_id(device_url)),
            name: format!("{label} Raw Data"),
            icon: Some("mdi:code-json"),
            kind: SensorKind::RawData {
                device_url: device_url.to_string(),
            },
        }
    }

    pub fn events() -> Self {
        Self {
            unique_id: "atlantic_explorer_events".to_string(),
            name: "Atlantic Explorer Events".to_string(),
            icon: Some("mdi:history"),
            kind: SensorKind::Events,
        }
    }

    pub fn full_dump() -> Self {
        Self {
            unique_id: "atlantic_explorer_full_dump".to_string(),
            name: "Atlantic Explorer Full Dump".to_string(),
            icon: Some("mdi:database-export"),
            kind: SensorKind::FullDump,
        }
    }

    pub fn device_info<C>(&self, coordinator: &Coordinator<C>) -> Option<DeviceInfo> {
        match &self.kind {
            SensorKind::State { device_url, .. } => coordinator
                .device(device_url)
                .map(|d| DeviceInfo::for_device(d, true)),
            SensorKind::RawData { device_url } => coordinator
                .device(device_url)
                .map(|d| DeviceInfo::for_device(d, false)),
            SensorKind::Events | SensorKind::FullDump => None,
        }
    }

    pub fn native_value<C>(&self, coordinator: &Coordinator<C>) -> Value {
        match &self.kind {
            SensorKind::State {
                device_url,
                state_name,
                ..
            } => coordinator
                .device(device_url)
                .and_then(|d| d.state_value(state_name))
                .cloned()
                .unwrap_or(Value::Null),
            SensorKind::RawData { device_url } => match coordinator.device(device_url) {
                Some(d) => json!(format!(
                    "{} states, {} commands",
                    d.states.len(),
                    d.commands.len()
                )),
                None => json!("No data"),
            },
            SensorKind::Events => json!(coordinator.events_log().len()),
            SensorKind::FullDump => {
                let dump = coordinator.full_dump();
                let devices = dump["devices"].as_object().map_or(0, Map::len);
                let gateways = dump["gateways"].as_array().map_or(0, Vec::len);
                json!(format!("{devices} devices, {gateways} gateways"))
            }
        }
    }

    pub fn extra_attributes<C>(&self, coordinator: &Coordinator<C>) -> Value {
        match &self.kind {
            SensorKind::State {
                device_url,
                state_name,
                ..
            } => {
                let Some(device) = coordinator.device(device_url) else {
                    return json!({});
                };
                let state = device.states.get(state_name);
                json!({
                    "state_name": state_name,
                    "value_type": state.map(|s| s.kind),
                    "raw": state.map(|s| s.raw.as_str()),
                    "device_url": device_url,
                    "widget": device.widget,
                    "ui_class": device.ui_class,
                    "last_updated": device.last_updated.to_rfc3339(),
                })
            }
            SensorKind::RawData { device_url } => coordinator
                .device(device_url)
                .map(crate::coordinator::device_json)
                .unwrap_or_else(|| json!({})),
            SensorKind::Events => {
                let log = coordinator.events_log();
                json!({
                    "total_events": log.len(),
                    "recent_events": log.recent(RECENT_EVENTS),
                })
            }
            SensorKind::FullDump => coordinator.full_dump(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinarySensorKind {
    Availability { device_url: String },
    State {
        device_url: String,
        state_name: String,
        config: Option<BinaryStateConfig>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinarySensor {
    pub unique_id: String,
    pub name: String,
    pub device_class: Option<BinarySensorDeviceClass>,
    pub kind: BinarySensorKind,
}

impl BinarySensor {
    pub fn availability<C>(coordinator: &Coordinator<C>, device_url: &str) -> Self {
        let label = device_label(coordinator, device_url);
        Self {
            unique_id: format!("{}_availability", safe_device_id(device_url)),
            name: format!("{label} Available"),
            device_class: Some(BinarySensorDeviceClass::Connectivity),
            kind: BinarySensorKind::Availability {
                device_url: device_url.to_string(),
            },
        }
    }

    pub fn state<C>(coordinator: &Coordinator<C>, device_url: &str, state_name: &str) -> Self {
        let label = device_label(coordinator, device_url);
        let config = binary_state_config(state_name).copied();
        Self {
            unique_id: format!(
                "{}_{}_binary",
                safe_device_id(device_url),
                safe_state_id(state_name)
            ),
            name: format!("{label} {}", format_state_name(state_name)),
            device_class: config.and_then(|c| c.device_class),
            kind: BinarySensorKind::State {
                device_url: device_url.to_string(),
                state_name: state_name.to_string(),
                config,
            },
        }
    }

    pub fn device_info<C>(&self, coordinator: &Coordinator<C>) -> Option<DeviceInfo> {
        let device_url = match &self.kind {
            BinarySensorKind::Availability { device_url } => device_url,
            BinarySensorKind::State { device_url, .. } => device_url,
        };
        coordinator
            .device(device_url)
            .map(|d| DeviceInfo::for_device(d, false))
    }

    pub fn is_on<C>(&self, coordinator: &Coordinator<C>) -> bool {
        match &self.kind {
            BinarySensorKind::Availability { device_url } => coordinator
                .device(device_url)
                .is_some_and(|d| d.available),
            BinarySensorKind::State {
                device_url,
                state_name,
                config,
            } => {
                let Some(value) = coordinator
                    .device(device_url)
                    .and_then(|d| d.state_value(state_name))
                else {
                    return false;
                };
                value_is_on(value, config.map_or(DEFAULT_ON_VALUES, |c| c.on_values))
            }
        }
    }

    pub fn extra_attributes<C>(&self, coordinator: &Coordinator<C>) -> Value {
        let BinarySensorKind::State {
            device_url,
            state_name,
            ..
        } = &self.kind
        else {
            return json!({});
        };
        let Some(device) = coordinator.device(device_url) else {
            return json!({});
        };
        let state = device.states.get(state_name);
        json!({
            "state_name": state_name,
            "raw_value": state.map(|s| &s.value),
            "value_type": state.map(|s| s.kind),
            "device_url": device_url,
        })
    }
}

/// Numbers compare by value against the numeric on-values, so `1.0` counts
/// as `"1"`. Everything else compares by text, ignoring case.
fn value_is_on(value: &Value, on_values: &[&str]) -> bool {
    if value == &Value::Bool(true) {
        return true;
    }
    if let Some(n) = value.as_f64()
        && on_values
            .iter()
            .filter_map(|on| on.parse::<f64>().ok())
            .any(|on| on == n)
    {
        return true;
    }
    let text = text_form(value);
    on_values.iter().any(|on| on.eq_ignore_ascii_case(&text))
}

fn device_label<C>(coordinator: &Coordinator<C>, device_url: &str) -> String {
    coordinator
        .device(device_url)
        .map_or_else(|| "Unknown".to_string(), |d| d.label.clone())
}

/// Per-device state sensors and a raw data sensor, then the two global ones.
pub fn build_sensors<C>(coordinator: &Coordinator<C>) -> Vec<Sensor> {
    let mut sensors = Vec::new();
    for (device_url, device) in coordinator.devices() {
        info!(device = %device.label, url = %device_url, "creating sensors");
        for state_name in device.states.keys() {
            sensors.push(Sensor::state(coordinator, device_url, state_name));
        }
        sensors.push(Sensor::raw_data(coordinator, device_url));
    }
    sensors.push(Sensor::events());
    sensors.push(Sensor::full_dump());
    info!(count = sensors.len(), "created sensor entities");
    sensors
}

/// An availability sensor per device, plus one per known or boolean-looking
/// state.
pub fn build_binary_sensors<C>(coordinator: &Coordinator<C>) -> Vec<BinarySensor> {
    let mut sensors = Vec::new();
    for (device_url, device) in coordinator.devices() {
        sensors.push(BinarySensor::availability(coordinator, device_url));
        for (state_name, state) in &device.states {
            if binary_state_config(state_name).is_some() {
                sensors.push(BinarySensor::state(coordinator, device_url, state_name));
            } else if looks_boolean(&state.value) {
                info!(device = %device.label, state = %state_name, "inferred binary sensor");
                sensors.push(BinarySensor::state(coordinator, device_url, state_name));
            }
        }
    }
    info!(count = sensors.len(), "created binary sensor entities");
    sensors
}
