use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::{EntryConfig, DOMAIN};
use crate::coordinator::Coordinator;
use crate::Result;

pub const TO_REDACT: &[&str] = &[
    "username",
    "password",
    "email",
    "access_token",
    "refresh_token",
    "token",
];

const REDACTED: &str = "**REDACTED**";
const DIAGNOSTIC_EVENTS: usize = 100;

/// Replaces the value of every key in `keys`, at any depth.
pub fn redact(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if keys.contains(&k.as_str()) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(v, keys)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact(v, keys)).collect()),
        other => other.clone(),
    }
}

/// Identity of the config entry the diagnostics are produced for.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo<'a> {
    pub entry_id: &'a str,
    pub version: u32,
    pub title: String,
    pub data: &'a EntryConfig,
}

/// Diagnostics document for one entry.
pub fn config_entry_diagnostics<C>(
    entry: &EntryInfo<'_>,
    coordinator: &Coordinator<C>,
) -> Result<Value> {
    let dump = coordinator.full_dump();
    let log = coordinator.events_log();

    let empty = Map::new();
    let devices_in = dump["devices"].as_object().unwrap_or(&empty);
    let gateways = dump["gateways"].clone();
    let gateway_count = gateways.as_array().map_or(0, Vec::len);

    let devices: Map<String, Value> = devices_in
        .iter()
        .map(|(url, device)| {
            let mut device = device.clone();
            if let Value::Object(ref mut fields) = device {
                fields.remove("device_url");
            }
            (url.clone(), device)
        })
        .collect();

    let diagnostics = json!({
        "entry": {
            "entry_id": entry.entry_id,
            "version": entry.version,
            "domain": DOMAIN,
            "title": entry.title,
            "data": redact(&serde_json::to_value(entry.data)?, TO_REDACT),
        },
        "data_summary": {
            "device_count": devices.len(),
            "gateway_count": gateway_count,
            "total_events": log.len(),
        },
        "gateways": gateways,
        "devices": devices,
        "events": log.recent(DIAGNOSTIC_EVENTS),
    });

    info!(
        devices = devices_in.len(),
        gateways = gateway_count,
        events = log.len(),
        "generated diagnostics"
    );
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_nested_keys() {
        let input = json!({
            "username": "me@example.com",
            "hub": "atlantic_cozytouch",
            "nested": [{"token": "abc", "keep": 1}],
        });
        let out = redact(&input, TO_REDACT);
        assert_eq!(out["username"], REDACTED);
        assert_eq!(out["hub"], "atlantic_cozytouch");
        assert_eq!(out["nested"][0]["token"], REDACTED);
        assert_eq!(out["nested"][0]["keep"], 1);
    }
}
