use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::diff::diff_json;
use crate::model::{Definition, Device, Extra, Gateway, Setup, State};
use crate::snapshot::{
    AttributeValue, CommandInfo, DeviceData, ExplorerData, ParameterInfo, StateDefinitionInfo,
    StateValue, ValueKind,
};

const NOT_AVAILABLE: &str = "N/A";

/// Replaces the gateway list and inserts or replaces every device of `setup`.
pub fn apply_setup(data: &mut ExplorerData, setup: &Setup, now: DateTime<Utc>) {
    data.gateways = setup.gateways.iter().map(gateway_fields).collect();
    for gateway in &data.gateways {
        debug!(gateway = ?gateway.get("id"), "processed gateway");
    }

    for device in &setup.devices {
        let mut fresh = normalize_device(device, now);
        if let Some(previous) = data.devices.get(&device.device_url) {
            report_missed_changes(previous, &fresh);
            fresh.touch(previous.last_updated);
        }
        data.devices.insert(device.device_url.clone(), fresh);
    }

    data.last_full_refresh = Some(now);
}

/// Flattens one vendor device into its snapshot record.
pub fn normalize_device(device: &Device, now: DateTime<Utc>) -> DeviceData {
    let states = device
        .states
        .iter()
        .map(|state| (state.name.clone(), state_value(state)))
        .collect();

    let attributes = device
        .attributes
        .iter()
        .map(|attr| {
            (
                attr.name.clone(),
                AttributeValue {
                    value: attr.value.clone(),
                    kind: ValueKind::of(&attr.value),
                },
            )
        })
        .collect();

    let (commands, state_definitions) = match &device.definition {
        Some(definition) => (commands_of(definition), state_definitions_of(definition)),
        None => (Vec::new(), Vec::new()),
    };

    DeviceData {
        device_url: device.device_url.clone(),
        label: device.label.clone(),
        widget: device.widget.clone(),
        ui_class: device.ui_class.clone(),
        controllable_name: device.controllable_name.clone(),
        protocol: device.protocol().unwrap_or_default().to_string(),
        device_type: device.product_type_name().unwrap_or_default(),
        available: device.available,
        states,
        attributes,
        commands,
        state_definitions,
        raw_data: device_fields(device),
        last_updated: now,
    }
}

pub(crate) fn state_value(state: &State) -> StateValue {
    StateValue {
        value: state.value.clone(),
        kind: ValueKind::of(&state.value),
        raw: state.to_string(),
    }
}

fn commands_of(definition: &Definition) -> Vec<CommandInfo> {
    definition
        .commands
        .iter()
        .map(|cmd| CommandInfo {
            name: cmd.command_name.clone(),
            parameters: cmd
                .parameters
                .iter()
                .map(|param| ParameterInfo {
                    name: param.name.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    param_type: match &param.param_type {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => NOT_AVAILABLE.to_string(),
                    },
                })
                .collect(),
        })
        .collect()
}

fn state_definitions_of(definition: &Definition) -> Vec<StateDefinitionInfo> {
    definition
        .states
        .iter()
        .map(|def| StateDefinitionInfo {
            name: def
                .qualified_name
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            state_type: def
                .state_type
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        })
        .collect()
}

/// Serializes one field; a failure becomes an error marker for that field only.
fn put(fields: &mut Map<String, Value>, name: &str, value: &impl Serialize) {
    let value = serde_json::to_value(value)
        .unwrap_or_else(|e| Value::String(format!("<error: {e}>")));
    fields.insert(name.to_string(), value);
}

fn put_extra(fields: &mut Map<String, Value>, extra: &Extra) {
    for (key, value) in extra {
        fields.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Every field of a gateway, named fields first, then whatever else the
/// server sent.
pub fn gateway_fields(gateway: &Gateway) -> Map<String, Value> {
    let mut fields = Map::new();
    put(&mut fields, "id", &gateway.gateway_id);
    put(&mut fields, "gateway_id", &gateway.gateway_id);
    put(&mut fields, "type", &gateway.gateway_type);
    put(&mut fields, "sub_type", &gateway.sub_type);
    put(&mut fields, "alive", &gateway.alive);
    put(&mut fields, "mode", &gateway.mode);
    put(
        &mut fields,
        "connectivity",
        &gateway.connectivity.as_ref().and_then(|c| c.status.clone()),
    );
    put(
        &mut fields,
        "protocol_version",
        &gateway
            .connectivity
            .as_ref()
            .and_then(|c| c.protocol_version.clone()),
    );
    put(&mut fields, "functions", &gateway.functions);
    put(&mut fields, "place_oid", &gateway.place_oid);
    put_extra(&mut fields, &gateway.extra);
    fields
}

/// Catch-all field sweep for a device. Nested records are kept in their
/// display form, as the explorer only shows them.
pub fn device_fields(device: &Device) -> Map<String, Value> {
    let mut fields = Map::new();
    put(&mut fields, "device_url", &device.device_url);
    put(&mut fields, "label", &device.label);
    put(&mut fields, "widget", &device.widget);
    put(&mut fields, "ui_class", &device.ui_class);
    put(&mut fields, "controllable_name", &device.controllable_name);
    put(&mut fields, "protocol", &device.protocol());
    put(&mut fields, "type", &device.product_type_name());
    put(&mut fields, "available", &device.available);
    put(&mut fields, "enabled", &device.enabled);
    put(&mut fields, "place_oid", &device.place_oid);
    put(
        &mut fields,
        "states",
        &device.states.iter().map(ToString::to_string).collect::<Vec<_>>(),
    );
    put(
        &mut fields,
        "attributes",
        &device.attributes.iter().map(ToString::to_string).collect::<Vec<_>>(),
    );
    put(&mut fields, "definition", &device.definition);
    put_extra(&mut fields, &device.extra);
    fields
}

/// A resync that changes state values means events were missed.
fn report_missed_changes(previous: &DeviceData, fresh: &DeviceData) {
    let prev = states_json(&previous.states);
    let curr = states_json(&fresh.states);
    let mut changes = Vec::new();
    diff_json(&prev, &curr, "", &mut changes);
    if !changes.is_empty() {
        info!(
            device = %fresh.label,
            count = changes.len(),
            "full refresh reconciled state changes not seen as events"
        );
        for change in &changes {
            debug!(path = %change.path, old = %change.old, new = %change.new, "reconciled");
        }
    }
}

fn states_json(states: &BTreeMap<String, StateValue>) -> Value {
    Value::Object(
        states
            .iter()
            .map(|(name, state)| (name.clone(), state.value.clone()))
            .collect(),
    )
}
