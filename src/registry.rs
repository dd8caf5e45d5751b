//! Config entry lifecycle: activation, lookup and unload.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::OverkizApi;
use crate::config::EntryConfig;
use crate::coordinator::Coordinator;
use crate::diagnostics::{config_entry_diagnostics, EntryInfo};
use crate::entities::{build_binary_sensors, build_sensors, BinarySensor, Sensor};
use crate::model::{Place, Setup};
use crate::{Result, SetupError};

pub const ENTRY_VERSION: u32 = 1;

/// An activated entry and everything built for it.
pub struct Entry<C> {
    pub entry_id: String,
    pub config: EntryConfig,
    pub coordinator: Coordinator<C>,
    pub sensors: Vec<Sensor>,
    pub binary_sensors: Vec<BinarySensor>,
}

impl<C> Entry<C> {
    pub fn diagnostics(&self) -> Result<Value> {
        let info = EntryInfo {
            entry_id: &self.entry_id,
            version: ENTRY_VERSION,
            title: self.config.title(),
            data: &self.config,
        };
        config_entry_diagnostics(&info, &self.coordinator)
    }
}

pub struct Registry<C> {
    entries: HashMap<String, Entry<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<C: OverkizApi> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs in, explores the account, builds the coordinator and performs
    /// the first refresh. Nothing is stored unless every step succeeds.
    pub async fn setup_entry(
        &mut self,
        entry_id: impl Into<String>,
        config: EntryConfig,
        mut client: C,
    ) -> std::result::Result<(), SetupError> {
        let entry_id = entry_id.into();

        if let Err(e) = client.login().await {
            warn!(entry = %entry_id, "login failed: {e}");
            return Err(SetupError::from_login(&e));
        }

        let setup = match client.get_setup().await {
            Ok(setup) => setup,
            Err(e) => {
                warn!(entry = %entry_id, "failed to load setup: {e}");
                return Err(SetupError::NotReady(format!("Failed to load setup: {e}")));
            }
        };

        log_exploration(&mut client, &setup).await;

        let mut coordinator = Coordinator::new(client, &setup);
        if let Err(e) = coordinator.refresh().await {
            return Err(SetupError::NotReady(e.to_string()));
        }

        let sensors = build_sensors(&coordinator);
        let binary_sensors = build_binary_sensors(&coordinator);

        info!(entry = %entry_id, title = %config.title(), "entry set up");
        self.entries.insert(
            entry_id.clone(),
            Entry {
                entry_id,
                config,
                coordinator,
                sensors,
                binary_sensors,
            },
        );
        Ok(())
    }

    /// Removes the entry and closes its session. Returns whether the entry
    /// existed.
    pub async fn unload_entry(&mut self, entry_id: &str) -> bool {
        let Some(entry) = self.entries.remove(entry_id) else {
            return false;
        };
        let mut client = entry.coordinator.into_client();
        if let Err(e) = client.close().await {
            warn!(entry = %entry_id, "error closing session: {e}");
        }
        info!(entry = %entry_id, "entry unloaded");
        true
    }
}

impl<C> Registry<C> {
    pub fn get(&self, entry_id: &str) -> Option<&Entry<C>> {
        self.entries.get(entry_id)
    }

    pub fn get_mut(&mut self, entry_id: &str) -> Option<&mut Entry<C>> {
        self.entries.get_mut(entry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Dumps what the account contains to the log. Scenario and action group
/// failures are not fatal.
async fn log_exploration<C: OverkizApi>(client: &mut C, setup: &Setup) {
    info!(gateways = setup.gateways.len(), "exploring account");
    for gateway in &setup.gateways {
        info!(
            id = %gateway.gateway_id,
            gateway_type = ?gateway.gateway_type,
            alive = gateway.alive,
            "gateway"
        );
    }

    info!(devices = setup.devices.len(), "devices");
    for device in &setup.devices {
        info!(
            label = %device.label,
            url = %device.device_url,
            widget = %device.widget,
            ui_class = %device.ui_class,
            controllable = %device.controllable_name,
            available = device.available,
            "device"
        );
        for state in &device.states {
            debug!(device = %device.label, "  {state}");
        }
        if let Some(definition) = &device.definition {
            for command in &definition.commands {
                debug!(
                    device = %device.label,
                    nparams = command.nparams,
                    "  command {}",
                    command.command_name
                );
            }
        }
    }

    if let Some(root) = &setup.root_place {
        log_place(root, 0);
    }

    match client.get_scenarios().await {
        Ok(scenarios) => {
            info!(count = scenarios.len(), "scenarios");
            for s in &scenarios {
                debug!(oid = %s.oid, "  scenario {}", s.label);
            }
        }
        Err(e) => warn!("could not fetch scenarios: {e}"),
    }

    match client.get_action_groups().await {
        Ok(groups) => {
            info!(count = groups.len(), "action groups");
            for g in &groups {
                debug!(actions = g.actions.len(), "  action group {}", g.label);
            }
        }
        Err(e) => warn!("could not fetch action groups: {e}"),
    }
}

fn log_place(place: &Place, depth: usize) {
    info!(
        oid = %place.oid,
        place_type = ?place.place_type,
        "{}place {}",
        "  ".repeat(depth),
        place.label
    );
    for sub in &place.sub_places {
        log_place(sub, depth + 1);
    }
}
