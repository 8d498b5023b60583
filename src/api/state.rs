//! API shared state

use std::sync::Arc;

use crate::actors::{PollStatusBoard, Supervisor};
use crate::query::QueryClient;
use crate::storage::Stores;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Starts, replaces and stops pollers
    pub supervisor: Arc<Supervisor>,

    /// Stores for read-only routes and for persisting admin changes
    pub stores: Stores,

    /// Client used to validate public add requests
    pub client: Arc<dyn QueryClient>,

    /// Poll outcomes reported by the pollers
    pub status: Arc<PollStatusBoard>,

    /// Players a server needs online for a public add request
    pub min_request_players: u32,
}

impl ApiState {
    /// Share stores, client and status board with the supervisor's pollers
    pub fn new(supervisor: Arc<Supervisor>, min_request_players: u32) -> Self {
        let ctx = supervisor.context().clone();

        Self {
            supervisor,
            stores: ctx.stores,
            client: ctx.client,
            status: ctx.status,
            min_request_players,
        }
    }
}
