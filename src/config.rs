use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::api::OverkizApi;
use crate::servers::Server;
use crate::{Error, Result};

pub const DOMAIN: &str = "atlantic_heat_pump_explorer";

/// Credentials and server for one account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub hub: Server,
}

impl fmt::Debug for EntryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("hub", &self.hub)
            .finish()
    }
}

impl EntryConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>, hub: Server) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hub,
        }
    }

    /// Reads an entry from a TOML file with `username`, `password` and an
    /// optional `hub`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Protocol(format!("invalid entry config: {e}")))
    }

    /// One entry per account and server.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.username, self.hub)
    }

    pub fn title(&self) -> String {
        format!("Atlantic Explorer ({})", self.username)
    }
}

/// Reason a credential check failed, as shown on the setup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidAuth,
    TooManyRequests,
    ServerMaintenance,
    Unknown,
}

impl ValidationError {
    pub fn code(self) -> &'static str {
        match self {
            ValidationError::InvalidAuth => "invalid_auth",
            ValidationError::TooManyRequests => "too_many_requests",
            ValidationError::ServerMaintenance => "server_maintenance",
            ValidationError::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Logs in and straight back out.
pub async fn validate_credentials<C: OverkizApi>(
    client: &mut C,
) -> std::result::Result<(), ValidationError> {
    let outcome = client.login().await;
    if let Err(e) = client.close().await {
        debug!("close after credential check failed: {e}");
    }
    outcome.map_err(|e| match e {
        Error::BadCredentials => ValidationError::InvalidAuth,
        Error::TooManyRequests => ValidationError::TooManyRequests,
        Error::Maintenance => ValidationError::ServerMaintenance,
        other => {
            error!("unexpected error validating credentials: {other}");
            ValidationError::Unknown
        }
    })
}
