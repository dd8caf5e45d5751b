use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub const EVENT_LOG_CAPACITY: usize = 1000;

/// Closed set of value kinds, decided from the JSON value as it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    Text,
    Opaque,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Float,
            Value::String(_) => ValueKind::Text,
            Value::Null | Value::Array(_) | Value::Object(_) => ValueKind::Opaque,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Display form of the vendor record, for diagnostics only.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub parameters: Vec<ParameterInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDefinitionInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceData {
    pub device_url: String,
    pub label: String,
    pub widget: String,
    pub ui_class: String,
    pub controllable_name: String,
    pub protocol: String,
    pub device_type: String,
    pub available: bool,
    pub states: BTreeMap<String, StateValue>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub commands: Vec<CommandInfo>,
    pub state_definitions: Vec<StateDefinitionInfo>,
    pub raw_data: Map<String, Value>,
    pub last_updated: DateTime<Utc>,
}

impl DeviceData {
    pub fn state_value(&self, name: &str) -> Option<&Value> {
        self.states.get(name).map(|s| &s.value)
    }

    /// Moves `last_updated` forward; it never goes back, even if the clock does.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub device_url: String,
    pub state: String,
    pub old: Value,
    pub new: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub event_number: u64,
    pub name: String,
    pub raw: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<StateChange>,
}

/// Rolling event log; once full, the oldest record is evicted per push.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    limit: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_limit(EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(EVENT_LOG_CAPACITY)),
            limit,
        }
    }

    pub fn push(&mut self, record: EventRecord) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, EventRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.back()
    }

    /// The most recent `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&EventRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).collect()
    }
}

impl Serialize for EventLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}

/// Everything the explorer knows about one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExplorerData {
    pub devices: BTreeMap<String, DeviceData>,
    pub gateways: Vec<Map<String, Value>>,
    pub events_log: EventLog,
    pub last_full_refresh: Option<DateTime<Utc>>,
}
