use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::api::OverkizApi;
use crate::events::EventProcessor;
use crate::model::Setup;
use crate::normalize::apply_setup;
use crate::snapshot::{DeviceData, EventLog, ExplorerData};
use crate::{Error, Result};

pub const UPDATE_INTERVAL: Duration = Duration::from_secs(30);

/// A full setup fetch backs up the event stream at least this often.
pub const FULL_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

const DUMP_RECENT_EVENTS: usize = 10;

/// Owns the client and the snapshot, and keeps the latter current.
pub struct Coordinator<C> {
    client: C,
    data: ExplorerData,
    processor: EventProcessor,
    update_interval: Duration,
}

impl<C: OverkizApi> Coordinator<C> {
    /// Builds the snapshot from the setup fetched at login.
    pub fn new(client: C, setup: &Setup) -> Self {
        let mut data = ExplorerData::default();
        apply_setup(&mut data, setup, Utc::now());
        info!(
            devices = data.devices.len(),
            gateways = data.gateways.len(),
            "initial setup processed"
        );
        Self {
            client,
            data,
            processor: EventProcessor::new(),
            update_interval: UPDATE_INTERVAL,
        }
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// One refresh cycle. On failure the previous snapshot is left as it was
    /// after the last applied event.
    pub async fn refresh(&mut self) -> Result<&ExplorerData> {
        if let Err(e) = self.try_refresh().await {
            error!(error = %e, "error fetching data from API");
            return Err(Error::UpdateFailed(e.to_string()));
        }
        Ok(&self.data)
    }

    async fn try_refresh(&mut self) -> Result<()> {
        let events = self.client.fetch_events().await?;
        self.processor
            .apply_all(&mut self.data, &events, Utc::now())?;

        if self.needs_full_refresh(Utc::now()) {
            info!("performing full setup refresh");
            let setup = self.client.get_setup().await?;
            apply_setup(&mut self.data, &setup, Utc::now());
        }
        Ok(())
    }

    fn needs_full_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.data.last_full_refresh {
            None => true,
            Some(last) => (now - last).num_seconds() > FULL_REFRESH_INTERVAL.as_secs() as i64,
        }
    }

    /// Refreshes on every tick of the update interval until `shutdown`
    /// resolves. Failed cycles are logged and retried on the next tick.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("coordinator stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!("refresh failed, keeping last snapshot: {e}");
                    }
                }
            }
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }
}

impl<C> Coordinator<C> {
    pub fn data(&self) -> &ExplorerData {
        &self.data
    }

    pub fn device(&self, device_url: &str) -> Option<&DeviceData> {
        self.data.devices.get(device_url)
    }

    pub fn devices(&self) -> &BTreeMap<String, DeviceData> {
        &self.data.devices
    }

    pub fn events_log(&self) -> &EventLog {
        &self.data.events_log
    }

    pub fn event_count(&self) -> u64 {
        self.processor.event_count()
    }

    /// Everything in the snapshot, flattened for diagnostics and export.
    pub fn full_dump(&self) -> Value {
        let devices: serde_json::Map<String, Value> = self
            .data
            .devices
            .iter()
            .map(|(url, device)| (url.clone(), device_json(device)))
            .collect();
        let last_events: Vec<Value> = self
            .data
            .events_log
            .recent(DUMP_RECENT_EVENTS)
            .into_iter()
            .map(|record| serde_json::to_value(record).unwrap_or(Value::Null))
            .collect();

        json!({
            "devices": devices,
            "gateways": self.data.gateways,
            "events_log_count": self.data.events_log.len(),
            "last_events": last_events,
            "last_full_refresh": self.data.last_full_refresh.map(|t| t.to_rfc3339()),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_last_full_refresh(&mut self, at: Option<DateTime<Utc>>) {
        self.data.last_full_refresh = at;
    }
}

pub(crate) fn device_json(device: &DeviceData) -> Value {
    json!({
        "device_url": device.device_url,
        "label": device.label,
        "widget": device.widget,
        "ui_class": device.ui_class,
        "controllable_name": device.controllable_name,
        "protocol": device.protocol,
        "device_type": device.device_type,
        "available": device.available,
        "states": device.states,
        "attributes": device.attributes,
        "commands": device.commands,
        "state_definitions": device.state_definitions,
        "raw_data": device.raw_data,
        "last_updated": device.last_updated.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionGroup, Device, Event, Scenario, State};
    use chrono::TimeDelta;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        batches: VecDeque<Result<Vec<Event>>>,
        setup: Setup,
        setup_calls: usize,
    }

    impl OverkizApi for Scripted {
        async fn login(&mut self) -> Result<()> {
            Ok(())
        }
        async fn get_setup(&mut self) -> Result<Setup> {
            self.setup_calls += 1;
            Ok(self.setup.clone())
        }
        async fn fetch_events(&mut self) -> Result<Vec<Event>> {
            self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
        async fn get_scenarios(&mut self) -> Result<Vec<Scenario>> {
            Ok(Vec::new())
        }
        async fn get_action_groups(&mut self) -> Result<Vec<ActionGroup>> {
            Ok(Vec::new())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> Setup {
        Setup {
            devices: vec![Device {
                device_url: "dev-1".to_string(),
                label: "Boiler".to_string(),
                available: true,
                states: vec![State::new("core:TemperatureState", 45.2)],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn recent_full_refresh_is_not_repeated() {
        let client = Scripted {
            setup: setup(),
            ..Default::default()
        };
        let mut coordinator = Coordinator::new(client, &setup());
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.client().setup_calls, 0);
    }

    #[tokio::test]
    async fn stale_snapshot_triggers_full_refresh() {
        let client = Scripted {
            setup: setup(),
            ..Default::default()
        };
        let mut coordinator = Coordinator::new(client, &setup());
        coordinator.set_last_full_refresh(Some(Utc::now() - TimeDelta::seconds(301)));
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.client().setup_calls, 1);

        coordinator.set_last_full_refresh(None);
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.client().setup_calls, 2);
    }

    #[tokio::test]
    async fn failure_is_reported_as_update_failed_and_keeps_snapshot() {
        let mut batches = VecDeque::new();
        batches.push_back(Err(Error::TooManyRequests));
        let client = Scripted {
            batches,
            setup: setup(),
            ..Default::default()
        };
        let mut coordinator = Coordinator::new(client, &setup());
        let before = coordinator.data().clone();

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, Error::UpdateFailed(_)), "got {err:?}");
        assert_eq!(coordinator.data(), &before);
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_going_after_a_failed_tick() {
        let mut batches = VecDeque::new();
        batches.push_back(Err(Error::TooManyRequests));
        batches.push_back(Ok(vec![Event::state_changed(
            "dev-1",
            vec![State::new("core:TemperatureState", 45.2)],
        )]));
        let client = Scripted {
            batches,
            setup: setup(),
            ..Default::default()
        };
        let interval = Duration::from_secs(30);
        let mut coordinator = Coordinator::new(client, &setup()).with_update_interval(interval);
        let states = coordinator.device("dev-1").unwrap().states.clone();

        let stop_after = interval * 2 + interval / 2;
        let started = tokio::time::Instant::now();
        coordinator.run(tokio::time::sleep(stop_after)).await;

        assert!(started.elapsed() >= stop_after);
        assert!(coordinator.client().batches.is_empty());
        assert_eq!(coordinator.event_count(), 1);
        assert_eq!(coordinator.device("dev-1").unwrap().states, states);
        assert!(coordinator.events_log().recent(1)[0].changes.is_empty());
        assert_eq!(coordinator.client().setup_calls, 0);
    }

    #[test]
    fn full_dump_shape() {
        let coordinator = Coordinator::new(Scripted::default(), &setup());
        let dump = coordinator.full_dump();
        assert_eq!(dump["devices"]["dev-1"]["label"], "Boiler");
        assert_eq!(
            dump["devices"]["dev-1"]["states"]["core:TemperatureState"]["value"],
            serde_json::json!(45.2)
        );
        assert_eq!(dump["events_log_count"], 0);
        assert!(dump["last_events"].as_array().unwrap().is_empty());
        assert!(dump["last_full_refresh"].is_string());
    }
}
