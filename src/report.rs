//! One-shot account exploration, written out as a JSON report.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::OverkizApi;
use crate::model::{Device, Place};
use crate::normalize::{device_fields, gateway_fields, normalize_device};
use crate::servers::Server;
use crate::snapshot::{AttributeValue, CommandInfo, StateDefinitionInfo, StateValue};
use crate::{Error, Result};

const REPORT_EVENTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExplorerReport {
    Complete(Box<FullReport>),
    /// Login failed; nothing else was attempted.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub timestamp: String,
    pub server: Server,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullReport {
    pub metadata: Metadata,
    pub gateways: Vec<Map<String, Value>>,
    pub devices: Vec<DeviceReport>,
    pub scenarios: Vec<ScenarioReport>,
    pub action_groups: Vec<ActionGroupReport>,
    pub places: Vec<PlaceReport>,
    /// Absent when the event fetch failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_events: Option<Vec<Value>>,
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub device_url: String,
    pub label: String,
    pub widget: String,
    pub ui_class: String,
    pub controllable_name: String,
    pub protocol: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub available: bool,
    pub enabled: bool,
    pub states: BTreeMap<String, StateValue>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub commands: Vec<CommandInfo>,
    pub state_definitions: Vec<StateDefinitionInfo>,
    pub raw: Map<String, Value>,
}

impl DeviceReport {
    fn of(device: &Device) -> Self {
        let data = normalize_device(device, Utc::now());
        Self {
            device_url: data.device_url,
            label: data.label,
            widget: data.widget,
            ui_class: data.ui_class,
            controllable_name: data.controllable_name,
            protocol: device.protocol().map(str::to_string),
            device_type: device.product_type_name(),
            available: device.available,
            enabled: device.enabled,
            states: data.states,
            attributes: data.attributes,
            commands: data.commands,
            state_definitions: data.state_definitions,
            raw: device_fields(device),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub oid: String,
    pub label: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionGroupReport {
    pub label: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceReport {
    pub oid: String,
    pub label: String,
    #[serde(rename = "type")]
    pub place_type: Option<String>,
    pub sub_places: Vec<PlaceReport>,
}

impl From<&Place> for PlaceReport {
    fn from(place: &Place) -> Self {
        Self {
            oid: place.oid.clone(),
            label: place.label.clone(),
            place_type: place.place_type.map(|t| t.to_string()),
            sub_places: place.sub_places.iter().map(PlaceReport::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportError {
    pub context: String,
    pub error: String,
}

impl FullReport {
    fn new(server: Server, email: &str) -> Self {
        Self {
            metadata: Metadata {
                timestamp: Local::now().to_rfc3339(),
                server,
                email: email.to_string(),
            },
            gateways: Vec::new(),
            devices: Vec::new(),
            scenarios: Vec::new(),
            action_groups: Vec::new(),
            places: Vec::new(),
            recent_events: None,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, context: &str, err: &Error) {
        warn!(context, "exploration step failed: {err}");
        self.errors.push(ReportError {
            context: context.to_string(),
            error: err.to_string(),
        });
    }

    pub fn total_states(&self) -> usize {
        self.devices.iter().map(|d| d.states.len()).sum()
    }

    pub fn total_commands(&self) -> usize {
        self.devices.iter().map(|d| d.commands.len()).sum()
    }
}

/// Logs in and collects everything the account exposes. Step failures after
/// login are recorded in the report rather than aborting it, except a failed
/// setup fetch, which ends the exploration.
pub async fn explore<C: OverkizApi>(client: &mut C, server: Server, email: &str) -> ExplorerReport {
    info!(%server, email, "exploring account");

    if let Err(e) = client.login().await {
        warn!("login failed: {e}");
        let error = match e {
            Error::BadCredentials => "Invalid credentials".to_string(),
            other => other.to_string(),
        };
        return ExplorerReport::Failed { error };
    }

    let mut report = FullReport::new(server, email);

    let setup = match client.get_setup().await {
        Ok(setup) => setup,
        Err(e) => {
            report.record("setup", &e);
            close(client).await;
            return ExplorerReport::Complete(Box::new(report));
        }
    };
    info!(
        gateways = setup.gateways.len(),
        devices = setup.devices.len(),
        "setup fetched"
    );

    report.gateways = setup.gateways.iter().map(gateway_fields).collect();
    report.devices = setup.devices.iter().map(DeviceReport::of).collect();

    match client.get_scenarios().await {
        Ok(scenarios) => {
            report.scenarios = scenarios
                .iter()
                .map(|s| ScenarioReport {
                    oid: s.oid.clone(),
                    label: s.label.clone(),
                    raw: to_raw(s),
                })
                .collect();
        }
        Err(e) => report.record("scenarios", &e),
    }

    match client.get_action_groups().await {
        Ok(groups) => {
            report.action_groups = groups
                .iter()
                .map(|g| ActionGroupReport {
                    label: g.label.clone(),
                    raw: to_raw(g),
                })
                .collect();
        }
        Err(e) => report.record("action_groups", &e),
    }

    if let Some(root) = &setup.root_place {
        report.places.push(PlaceReport::from(root));
    }

    match client.fetch_events().await {
        Ok(events) => {
            info!(count = events.len(), "events fetched");
            report.recent_events = Some(events.iter().take(REPORT_EVENTS).map(to_raw).collect());
        }
        Err(e) => report.record("events", &e),
    }

    close(client).await;
    ExplorerReport::Complete(Box::new(report))
}

fn to_raw<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| Value::String(format!("<error: {e}>")))
}

async fn close<C: OverkizApi>(client: &mut C) {
    if let Err(e) = client.close().await {
        warn!("error closing session: {e}");
    }
}

/// Default report file name, stamped with local time.
pub fn default_output_name() -> String {
    format!("atlantic_api_dump_{}.json", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Pretty-printed JSON, two-space indented.
pub fn write_report(report: &ExplorerReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_shape() {
        let name = default_output_name();
        assert!(name.starts_with("atlantic_api_dump_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "atlantic_api_dump_20240101_120000.json".len());
    }

    #[test]
    fn failed_report_is_a_single_error_field() {
        let report = ExplorerReport::Failed {
            error: "Invalid credentials".to_string(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, serde_json::json!({"error": "Invalid credentials"}));
    }

    #[test]
    fn places_nest() {
        let root = Place {
            oid: "root".to_string(),
            label: "Home".to_string(),
            place_type: Some(200),
            sub_places: vec![Place {
                oid: "kitchen".to_string(),
                label: "Kitchen".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let report = PlaceReport::from(&root);
        assert_eq!(report.place_type.as_deref(), Some("200"));
        assert_eq!(report.sub_places[0].label, "Kitchen");
        assert!(report.sub_places[0].place_type.is_none());
    }
}
