//! Typed view of the Overkiz end-user API payloads.
//!
//! Each record names the fields the explorer reads and keeps every other
//! field in `extra`, so nothing the server sends is lost on the way to the
//! snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Extra = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub root_place: Option<Place>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub protocol_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub gateway_id: String,
    #[serde(rename = "type", default)]
    pub gateway_type: Option<i64>,
    #[serde(default)]
    pub sub_type: Option<i64>,
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub connectivity: Option<Connectivity>,
    #[serde(default)]
    pub functions: Option<String>,
    #[serde(rename = "placeOID", default)]
    pub place_oid: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A state or attribute entry as delivered by the server.
///
/// Event payloads carry every value as a string next to its type code; the
/// value is converted on the way in, so a float arrives as a number whether
/// it came from `setup` or from an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireState")]
pub struct State {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: i64,
    #[serde(default)]
    pub value: Value,
}

#[derive(Deserialize)]
struct WireState {
    name: String,
    #[serde(rename = "type", default)]
    data_type: i64,
    #[serde(default)]
    value: Value,
}

impl From<WireState> for State {
    fn from(wire: WireState) -> Self {
        let value = match wire.value {
            Value::String(text) => typed_value(wire.data_type, text),
            other => other,
        };
        Self {
            name: wire.name,
            data_type: wire.data_type,
            value,
        }
    }
}

/// Parses a stringly-typed value according to its Overkiz type code. Text
/// that does not parse as its declared type is kept as text.
fn typed_value(data_type: i64, text: String) -> Value {
    let parsed = match data_type {
        1 => text.trim().parse::<i64>().ok().map(Value::from),
        2 => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        6 => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        10 | 11 => serde_json::from_str(&text).ok(),
        _ => None,
    };
    parsed.unwrap_or(Value::String(text))
}

impl State {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let data_type = data_type_of(&value);
        Self {
            name: name.into(),
            data_type,
            value,
        }
    }
}

/// Overkiz data type codes for a JSON value.
fn data_type_of(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Number(n) if n.is_i64() || n.is_u64() => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Bool(_) => 6,
        Value::Array(_) => 10,
        Value::Object(_) => 11,
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State(name={}, type={}, value={})",
            self.name, self.data_type, self.value
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub param_type: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDefinition {
    pub command_name: String,
    #[serde(default)]
    pub nparams: u32,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDefinition {
    #[serde(default)]
    pub qualified_name: Option<String>,
    #[serde(rename = "type", default)]
    pub state_type: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    #[serde(default)]
    pub commands: Vec<CommandDefinition>,
    #[serde(default)]
    pub states: Vec<StateDefinition>,
    #[serde(default)]
    pub widget_name: Option<String>,
    #[serde(default)]
    pub ui_class: Option<String>,
    #[serde(default)]
    pub qualified_name: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "deviceURL")]
    pub device_url: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub widget: String,
    #[serde(default)]
    pub ui_class: String,
    #[serde(default)]
    pub controllable_name: String,
    #[serde(rename = "type", default)]
    pub product_type: Option<i64>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub states: Vec<State>,
    #[serde(default)]
    pub attributes: Vec<State>,
    #[serde(default)]
    pub definition: Option<Definition>,
    #[serde(rename = "placeOID", default)]
    pub place_oid: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Device {
    /// Protocol is the scheme of the device URL (`io://...` -> `io`).
    pub fn protocol(&self) -> Option<&str> {
        self.device_url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|scheme| !scheme.is_empty())
    }

    pub fn product_type_name(&self) -> Option<String> {
        let code = self.product_type?;
        let name = match code {
            0 => "NONE",
            1 => "ACTUATOR",
            2 => "SENSOR",
            3 => "VIDEO",
            4 => "CONTROLLABLE",
            5 => "GATEWAY",
            6 => "INFRASTRUCTURE_COMPONENT",
            7 => "GROUP",
            other => return Some(other.to_string()),
        };
        Some(name.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default)]
    pub oid: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub place_type: Option<i64>,
    #[serde(default)]
    pub sub_places: Vec<Place>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    DeviceStateChanged,
    DeviceAvailable,
    DeviceUnavailable,
    DeviceCreated,
    DeviceUpdated,
    Other(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            EventName::DeviceStateChanged => "DeviceStateChangedEvent",
            EventName::DeviceAvailable => "DeviceAvailableEvent",
            EventName::DeviceUnavailable => "DeviceUnavailableEvent",
            EventName::DeviceCreated => "DeviceCreatedEvent",
            EventName::DeviceUpdated => "DeviceUpdatedEvent",
            EventName::Other(name) => name,
        }
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "DeviceStateChangedEvent" => EventName::DeviceStateChanged,
            "DeviceAvailableEvent" => EventName::DeviceAvailable,
            "DeviceUnavailableEvent" => EventName::DeviceUnavailable,
            "DeviceCreatedEvent" => EventName::DeviceCreated,
            "DeviceUpdatedEvent" => EventName::DeviceUpdated,
            _ => EventName::Other(name),
        }
    }
}

impl From<EventName> for String {
    fn from(name: EventName) -> Self {
        name.as_str().to_string()
    }
}

impl Serialize for EventName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(EventName::from)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub name: EventName,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(rename = "deviceURL", default)]
    pub device_url: Option<String>,
    #[serde(default)]
    pub device_states: Vec<State>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Event {
    pub fn new(name: EventName) -> Self {
        Self {
            name,
            timestamp: None,
            device_url: None,
            device_states: Vec::new(),
            extra: Extra::new(),
        }
    }

    pub fn state_changed(device_url: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            device_url: Some(device_url.into()),
            device_states: states,
            ..Self::new(EventName::DeviceStateChanged)
        }
    }

    pub fn availability(device_url: impl Into<String>, available: bool) -> Self {
        let name = if available {
            EventName::DeviceAvailable
        } else {
            EventName::DeviceUnavailable
        };
        Self {
            device_url: Some(device_url.into()),
            ..Self::new(name)
        }
    }

    /// `(device URL, new states)` pairs carried by a state-changed event.
    pub fn state_changes(&self) -> Vec<(&str, &[State])> {
        match &self.device_url {
            Some(url) if !self.device_states.is_empty() => {
                vec![(url.as_str(), self.device_states.as_slice())]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "deviceURL", default)]
    pub device_url: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub oid: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionGroup {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(flatten)]
    pub extra: Extra,
}
