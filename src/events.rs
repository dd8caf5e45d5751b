use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::model::{Event, EventName};
use crate::normalize::state_value;
use crate::snapshot::{EventRecord, ExplorerData, StateChange};
use crate::Result;

/// Applies fetched events to the snapshot, one log record per event.
#[derive(Debug, Default)]
pub struct EventProcessor {
    event_count: u64,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen over the processor's lifetime, including evicted ones.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn apply_all(
        &mut self,
        data: &mut ExplorerData,
        events: &[Event],
        now: DateTime<Utc>,
    ) -> Result<()> {
        for event in events {
            self.apply(data, event, now)?;
        }
        Ok(())
    }

    pub fn apply(
        &mut self,
        data: &mut ExplorerData,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.event_count += 1;
        let raw = serde_json::to_value(event)?;

        info!(number = self.event_count, name = %event.name, "event");
        debug!(details = %raw, "event details");

        let device = event.device_url.as_deref().unwrap_or("unknown");
        let changes = match &event.name {
            EventName::DeviceStateChanged => handle_state_change(data, event, now),
            EventName::DeviceAvailable => {
                handle_availability(data, event, true, now);
                Vec::new()
            }
            EventName::DeviceUnavailable => {
                handle_availability(data, event, false, now);
                Vec::new()
            }
            EventName::DeviceCreated => {
                info!(device, "new device created");
                Vec::new()
            }
            EventName::DeviceUpdated => {
                info!(device, "device updated");
                Vec::new()
            }
            EventName::Other(_) => Vec::new(),
        };

        data.events_log.push(EventRecord {
            timestamp: now,
            event_number: self.event_count,
            name: event.name.to_string(),
            raw,
            changes,
        });
        Ok(())
    }
}

fn handle_state_change(
    data: &mut ExplorerData,
    event: &Event,
    now: DateTime<Utc>,
) -> Vec<StateChange> {
    let mut changes = Vec::new();
    for (device_url, states) in event.state_changes() {
        let Some(device) = data.devices.get_mut(device_url) else {
            debug!(device = device_url, "state change for unknown device ignored");
            continue;
        };
        for state in states {
            let old = device
                .states
                .get(&state.name)
                .map(|s| s.value.clone())
                .unwrap_or_default();
            device.states.insert(state.name.clone(), state_value(state));
            device.touch(now);

            if old != state.value {
                info!(
                    device = %device.label,
                    state = %state.name,
                    old = %old,
                    new = %state.value,
                    "STATE CHANGE"
                );
                changes.push(StateChange {
                    device_url: device_url.to_string(),
                    state: state.name.clone(),
                    old,
                    new: state.value.clone(),
                });
            }
        }
    }
    changes
}

fn handle_availability(
    data: &mut ExplorerData,
    event: &Event,
    available: bool,
    now: DateTime<Utc>,
) {
    let Some(device) = event
        .device_url
        .as_deref()
        .and_then(|url| data.devices.get_mut(url))
    else {
        return;
    };
    device.available = available;
    device.touch(now);
    info!(
        device = %device.label,
        status = if available { "available" } else { "unavailable" },
        "AVAILABILITY CHANGE"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, State};
    use crate::normalize::normalize_device;
    use chrono::Duration;
    use serde_json::json;

    fn snapshot_with_boiler(now: DateTime<Utc>) -> ExplorerData {
        let device = Device {
            device_url: "dev-1".to_string(),
            label: "Boiler".to_string(),
            available: true,
            states: vec![State::new("core:TemperatureState", 45.2)],
            ..Default::default()
        };
        let mut data = ExplorerData::default();
        data.devices
            .insert("dev-1".to_string(), normalize_device(&device, now));
        data
    }

    #[test]
    fn state_change_records_transition() {
        let t0 = Utc::now();
        let mut data = snapshot_with_boiler(t0);
        let mut processor = EventProcessor::new();
        let event = Event::state_changed("dev-1", vec![State::new("core:TemperatureState", 46.0)]);

        processor.apply(&mut data, &event, t0 + Duration::seconds(1)).unwrap();

        let device = &data.devices["dev-1"];
        assert_eq!(device.state_value("core:TemperatureState"), Some(&json!(46.0)));
        assert_eq!(data.events_log.len(), 1);
        let record = data.events_log.last().unwrap();
        assert_eq!(record.name, "DeviceStateChangedEvent");
        assert_eq!(record.event_number, 1);
        assert_eq!(record.changes.len(), 1);
        assert_eq!(record.changes[0].old, json!(45.2));
        assert_eq!(record.changes[0].new, json!(46.0));
    }

    #[test]
    fn unchanged_value_still_touches_device() {
        let t0 = Utc::now();
        let mut data = snapshot_with_boiler(t0);
        let mut processor = EventProcessor::new();
        let later = t0 + Duration::seconds(5);
        let event = Event::state_changed("dev-1", vec![State::new("core:TemperatureState", 45.2)]);

        processor.apply(&mut data, &event, later).unwrap();

        assert_eq!(data.devices["dev-1"].last_updated, later);
        assert!(data.events_log.last().unwrap().changes.is_empty());
    }

    #[test]
    fn cloud_event_strings_compare_as_numbers() {
        let t0 = Utc::now();
        let mut data = snapshot_with_boiler(t0);
        let mut processor = EventProcessor::new();
        let event: Event = serde_json::from_value(json!({
            "name": "DeviceStateChangedEvent",
            "deviceURL": "dev-1",
            "deviceStates": [{"name": "core:TemperatureState", "type": 2, "value": "45.2"}]
        }))
        .unwrap();

        processor.apply(&mut data, &event, t0).unwrap();

        let state = &data.devices["dev-1"].states["core:TemperatureState"];
        assert_eq!(state.value, json!(45.2));
        assert_eq!(state.kind, crate::snapshot::ValueKind::Float);
        assert!(data.events_log.last().unwrap().changes.is_empty());
    }

    #[test]
    fn new_state_names_are_added() {
        let t0 = Utc::now();
        let mut data = snapshot_with_boiler(t0);
        let mut processor = EventProcessor::new();
        let event = Event::state_changed("dev-1", vec![State::new("core:OnOffState", "on")]);
        processor.apply(&mut data, &event, t0).unwrap();
        let device = &data.devices["dev-1"];
        assert_eq!(device.states.len(), 2);
        assert_eq!(device.state_value("core:OnOffState"), Some(&json!("on")));
    }

    #[test]
    fn created_and_updated_events_only_log() {
        let t0 = Utc::now();
        let mut data = snapshot_with_boiler(t0);
        let before = data.devices.clone();
        let mut processor = EventProcessor::new();
        let mut created = Event::new(EventName::DeviceCreated);
        created.device_url = Some("dev-2".to_string());
        let mut updated = Event::new(EventName::DeviceUpdated);
        updated.device_url = Some("dev-1".to_string());

        processor
            .apply_all(&mut data, &[created, updated], t0 + Duration::seconds(1))
            .unwrap();

        assert_eq!(data.devices, before);
        assert_eq!(data.events_log.len(), 2);
        assert_eq!(processor.event_count(), 2);
    }

    #[test]
    fn other_events_are_logged_by_name() {
        let mut data = ExplorerData::default();
        let mut processor = EventProcessor::new();
        let event = Event::new(EventName::Other("GatewayAliveEvent".to_string()));
        processor.apply(&mut data, &event, Utc::now()).unwrap();
        assert_eq!(data.events_log.last().unwrap().name, "GatewayAliveEvent");
    }
}
