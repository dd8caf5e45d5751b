#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use atlantic_explorer::model::{ActionGroup, Scenario};
use atlantic_explorer::{Device, Error, Event, OverkizApi, Result, Setup, State};

/// In-memory stand-in for the vendor cloud.
#[derive(Default)]
pub struct FakeApi {
    pub login_error: Option<Error>,
    pub setup: Setup,
    pub setup_error: Option<Error>,
    pub batches: VecDeque<Result<Vec<Event>>>,
    pub scenarios_error: Option<Error>,
    pub scenarios: Vec<Scenario>,
    pub action_groups: Vec<ActionGroup>,
    pub setup_calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn with_setup(setup: Setup) -> Self {
        Self {
            setup,
            ..Default::default()
        }
    }

    pub fn push_events(&mut self, events: Vec<Event>) {
        self.batches.push_back(Ok(events));
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }
}

impl OverkizApi for FakeApi {
    async fn login(&mut self) -> Result<()> {
        match self.login_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn get_setup(&mut self) -> Result<Setup> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        match self.setup_error.take() {
            Some(e) => Err(e),
            None => Ok(self.setup.clone()),
        }
    }

    async fn fetch_events(&mut self) -> Result<Vec<Event>> {
        self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_scenarios(&mut self) -> Result<Vec<Scenario>> {
        match self.scenarios_error.take() {
            Some(e) => Err(e),
            None => Ok(self.scenarios.clone()),
        }
    }

    async fn get_action_groups(&mut self) -> Result<Vec<ActionGroup>> {
        Ok(self.action_groups.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn device(url: &str, label: &str, states: Vec<State>) -> Device {
    Device {
        device_url: url.to_string(),
        label: label.to_string(),
        widget: "DomesticHotWaterProduction".to_string(),
        ui_class: "WaterHeatingSystem".to_string(),
        controllable_name: "io:AtlanticDomesticHotWaterProductionV2_MURAL_IOComponent".to_string(),
        available: true,
        enabled: true,
        states,
        ..Default::default()
    }
}

/// One boiler, `dev-1`, at 45.2 degrees.
pub fn boiler_setup() -> Setup {
    Setup {
        devices: vec![device(
            "dev-1",
            "Boiler",
            vec![State::new("core:TemperatureState", 45.2)],
        )],
        ..Default::default()
    }
}
