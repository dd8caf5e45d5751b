//! Client and exploration tooling for Atlantic heat pumps on the
//! Overkiz/Cozytouch cloud.
//!
//! [`OverkizClient`] talks to the vendor API. A [`Coordinator`] owns a client
//! and keeps an [`ExplorerData`] snapshot current from the event stream, with
//! periodic full resyncs. [`Registry`] manages coordinators per account, and
//! [`report::explore`] produces a one-shot JSON dump.

pub mod api;
mod client;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
mod diff;
pub mod entities;
mod error;
pub mod events;
mod logger;
pub mod model;
pub mod normalize;
pub mod protocol;
pub mod registry;
pub mod report;
mod servers;
pub mod snapshot;

pub use api::OverkizApi;
pub use client::{OverkizClient, OverkizClientBuilder};
pub use config::{EntryConfig, ValidationError, validate_credentials};
pub use coordinator::Coordinator;
pub use error::{Error, Result, SetupError};
pub use events::EventProcessor;
pub use logger::MessageLogMode;
pub use model::{Device, Event, EventName, Setup, State};
pub use registry::{Entry, Registry};
pub use servers::{AuthFlow, Server};
pub use snapshot::{DeviceData, EventLog, EventRecord, ExplorerData, StateValue, ValueKind};
