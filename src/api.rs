use std::future::Future;

use crate::model::{ActionGroup, Event, Scenario, Setup};
use crate::Result;

/// The vendor cloud as seen by the coordinator, the registry and the explorer.
///
/// [`OverkizClient`](crate::OverkizClient) talks to the real service; tests
/// substitute scripted implementations.
pub trait OverkizApi {
    fn login(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn get_setup(&mut self) -> impl Future<Output = Result<Setup>> + Send;

    /// Events queued since the previous fetch, in delivery order.
    fn fetch_events(&mut self) -> impl Future<Output = Result<Vec<Event>>> + Send;

    fn get_scenarios(&mut self) -> impl Future<Output = Result<Vec<Scenario>>> + Send;

    fn get_action_groups(&mut self) -> impl Future<Output = Result<Vec<ActionGroup>>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
