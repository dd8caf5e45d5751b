mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use atlantic_explorer::model::Gateway;
use atlantic_explorer::normalize::apply_setup;
use atlantic_explorer::snapshot::EVENT_LOG_CAPACITY;
use atlantic_explorer::{Coordinator, Event, EventProcessor, ExplorerData, State, ValueKind};
use common::{FakeApi, boiler_setup, device};

fn temperature(event_value: f64) -> Event {
    Event::state_changed("dev-1", vec![State::new("core:TemperatureState", event_value)])
}

#[tokio::test]
async fn boiler_temperature_change_is_applied_and_logged() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.push_events(vec![temperature(46.0)]);
    let mut coordinator = Coordinator::new(api, &boiler_setup());
    let before = coordinator.device("dev-1").unwrap().last_updated;

    coordinator.refresh().await.expect("refresh should succeed");

    let boiler = coordinator.device("dev-1").unwrap();
    let state = &boiler.states["core:TemperatureState"];
    assert_eq!(state.value, json!(46.0));
    assert_eq!(state.kind, ValueKind::Float);
    assert!(boiler.last_updated >= before);

    let log = coordinator.events_log();
    assert_eq!(log.len(), 1);
    let record = log.last().unwrap();
    assert_eq!(record.name, "DeviceStateChangedEvent");
    assert_eq!(record.event_number, 1);
    assert_eq!(record.changes[0].old, json!(45.2));
    assert_eq!(record.changes[0].new, json!(46.0));
}

#[tokio::test]
async fn availability_toggles() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.push_events(vec![Event::availability("dev-1", false)]);
    api.push_events(vec![Event::availability("dev-1", true)]);
    let mut coordinator = Coordinator::new(api, &boiler_setup());

    coordinator.refresh().await.unwrap();
    assert!(!coordinator.device("dev-1").unwrap().available);
    assert_eq!(coordinator.events_log().last().unwrap().name, "DeviceUnavailableEvent");

    coordinator.refresh().await.unwrap();
    assert!(coordinator.device("dev-1").unwrap().available);
    assert_eq!(coordinator.events_log().len(), 2);
    assert_eq!(coordinator.event_count(), 2);
}

#[tokio::test]
async fn state_change_for_unknown_device_only_logs() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.push_events(vec![Event::state_changed(
        "dev-404",
        vec![State::new("core:TemperatureState", 10.0)],
    )]);
    let mut coordinator = Coordinator::new(api, &boiler_setup());
    let devices_before = coordinator.devices().clone();

    coordinator.refresh().await.unwrap();

    assert_eq!(coordinator.devices(), &devices_before);
    assert!(coordinator.device("dev-404").is_none());
    assert_eq!(coordinator.events_log().len(), 1);
}

#[tokio::test]
async fn later_state_change_wins() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.push_events(vec![temperature(47.0)]);
    api.push_events(vec![temperature(48.5)]);
    let mut coordinator = Coordinator::new(api, &boiler_setup());

    coordinator.refresh().await.unwrap();
    let first = coordinator.device("dev-1").unwrap().last_updated;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    coordinator.refresh().await.unwrap();

    let boiler = coordinator.device("dev-1").unwrap();
    assert_eq!(boiler.state_value("core:TemperatureState"), Some(&json!(48.5)));
    assert!(boiler.last_updated > first);
}

#[tokio::test]
async fn update_failure_keeps_previous_snapshot() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.batches.push_back(Err(atlantic_explorer::Error::Maintenance));
    let mut coordinator = Coordinator::new(api, &boiler_setup());
    let before = coordinator.data().clone();

    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, atlantic_explorer::Error::UpdateFailed(_)), "got {err:?}");
    assert_eq!(coordinator.data(), &before);

    coordinator.refresh().await.expect("next cycle recovers");
}

#[tokio::test]
async fn full_refresh_is_skipped_while_recent() {
    let api = FakeApi::with_setup(boiler_setup());
    let setup_calls = api.setup_calls.clone();
    let mut coordinator = Coordinator::new(api, &boiler_setup());

    coordinator.refresh().await.unwrap();
    coordinator.refresh().await.unwrap();

    assert_eq!(setup_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn resync_is_idempotent() {
    let mut setup = boiler_setup();
    setup.gateways.push(Gateway {
        gateway_id: "1234-5678-9012".to_string(),
        alive: true,
        ..Default::default()
    });
    let now = Utc::now();

    let mut once = ExplorerData::default();
    apply_setup(&mut once, &setup, now);
    let mut twice = once.clone();
    apply_setup(&mut twice, &setup, now);

    assert_eq!(once, twice);
    assert_eq!(twice.gateways.len(), 1);
    assert_eq!(twice.devices.len(), 1);
}

#[test]
fn resync_keeps_device_keys_unique() {
    let mut setup = boiler_setup();
    setup.devices.push(device("dev-2", "Heat pump", vec![]));
    setup.devices.push(device(
        "dev-1",
        "Boiler (renamed)",
        vec![State::new("core:TemperatureState", 50.0)],
    ));

    let mut data = ExplorerData::default();
    apply_setup(&mut data, &setup, Utc::now());

    assert_eq!(data.devices.len(), 2);
    assert_eq!(data.devices["dev-1"].label, "Boiler (renamed)");
    for (url, device) in &data.devices {
        assert_eq!(url, &device.device_url);
    }
}

#[test]
fn resync_does_not_move_last_updated_backwards() {
    let now = Utc::now();
    let mut data = ExplorerData::default();
    apply_setup(&mut data, &boiler_setup(), now);

    apply_setup(&mut data, &boiler_setup(), now - Duration::seconds(60));

    assert_eq!(data.devices["dev-1"].last_updated, now);
}

#[test]
fn event_log_keeps_the_newest_thousand() {
    let now = Utc::now();
    let mut data = ExplorerData::default();
    apply_setup(&mut data, &boiler_setup(), now);
    let mut processor = EventProcessor::new();

    let events: Vec<Event> = (0..EVENT_LOG_CAPACITY + 250)
        .map(|i| temperature(40.0 + i as f64 / 10.0))
        .collect();
    processor.apply_all(&mut data, &events, now).unwrap();

    assert_eq!(data.events_log.len(), EVENT_LOG_CAPACITY);
    assert_eq!(processor.event_count(), (EVENT_LOG_CAPACITY + 250) as u64);
    let numbers: Vec<u64> = data.events_log.iter().map(|r| r.event_number).collect();
    assert_eq!(numbers.first(), Some(&251));
    assert_eq!(numbers.last(), Some(&((EVENT_LOG_CAPACITY + 250) as u64)));
    assert!(numbers.windows(2).all(|w| w[0] + 1 == w[1]));
}

#[test]
fn unknown_event_names_are_logged_untouched() {
    let now = Utc::now();
    let mut data = ExplorerData::default();
    apply_setup(&mut data, &boiler_setup(), now);
    let devices = data.devices.clone();

    let raw = json!({
        "name": "ExecutionStateChangedEvent",
        "execId": "abc",
        "newState": "COMPLETED"
    });
    let event: Event = serde_json::from_value(raw).unwrap();
    let mut processor = EventProcessor::new();
    processor.apply(&mut data, &event, now).unwrap();

    assert_eq!(data.devices, devices);
    let record = data.events_log.last().unwrap();
    assert_eq!(record.name, "ExecutionStateChangedEvent");
    assert_eq!(record.raw["execId"], "abc");
}

#[tokio::test]
async fn full_dump_reports_recent_events() {
    let mut api = FakeApi::with_setup(boiler_setup());
    api.push_events((0..12).map(|i| temperature(50.0 + i as f64)).collect());
    let mut coordinator = Coordinator::new(api, &boiler_setup());
    coordinator.refresh().await.unwrap();

    let dump = coordinator.full_dump();
    assert_eq!(dump["events_log_count"], 12);
    let last = dump["last_events"].as_array().unwrap();
    assert_eq!(last.len(), 10);
    assert_eq!(last[0]["event_number"], 3);
    assert_eq!(last[9]["event_number"], 12);
    assert_eq!(dump["devices"]["dev-1"]["states"]["core:TemperatureState"]["value"], json!(61.0));
    assert_eq!(dump["gateways"], json!([]));
}
