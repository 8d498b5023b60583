//! Per-target poll status for observability
//!
//! Workers report every poll outcome here. Nothing in the polling core reads
//! it back; it only feeds the `/status` endpoint and tests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{Sample, TargetId};

/// Outcome counters and most recent events for one target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollStatus {
    /// Generation of the worker that reported last
    pub generation: u64,

    pub successes: u64,
    pub query_failures: u64,
    pub persistence_failures: u64,

    pub last_success: Option<DateTime<Utc>>,
    pub last_online: Option<u32>,

    pub last_query_error: Option<String>,
    pub last_query_error_at: Option<DateTime<Utc>>,

    pub last_persistence_error: Option<String>,
    pub last_persistence_error_at: Option<DateTime<Utc>>,
}

/// Shared poll status store
#[derive(Debug, Default)]
pub struct PollStatusBoard {
    statuses: RwLock<HashMap<TargetId, PollStatus>>,
}

impl PollStatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker generation started polling; counters carry over
    pub async fn worker_started(&self, id: &TargetId, generation: u64) {
        let mut statuses = self.statuses.write().await;
        statuses.entry(id.clone()).or_default().generation = generation;
    }

    pub async fn record_success(&self, sample: &Sample) {
        let mut statuses = self.statuses.write().await;
        let status = statuses.entry(sample.target.clone()).or_default();
        status.successes += 1;
        status.last_success = Some(sample.timestamp);
        status.last_online = Some(sample.online);
    }

    pub async fn record_query_failure(
        &self,
        id: &TargetId,
        error: &(dyn std::fmt::Display + Sync),
    ) {
        let mut statuses = self.statuses.write().await;
        let status = statuses.entry(id.clone()).or_default();
        status.query_failures += 1;
        status.last_query_error = Some(error.to_string());
        status.last_query_error_at = Some(Utc::now());
    }

    pub async fn record_persistence_failure(
        &self,
        id: &TargetId,
        error: &(dyn std::fmt::Display + Sync),
    ) {
        let mut statuses = self.statuses.write().await;
        let status = statuses.entry(id.clone()).or_default();
        status.persistence_failures += 1;
        status.last_persistence_error = Some(error.to_string());
        status.last_persistence_error_at = Some(Utc::now());
    }

    pub async fn get(&self, id: &TargetId) -> Option<PollStatus> {
        self.statuses.read().await.get(id).cloned()
    }

    /// Drop everything known about a target (on removal)
    pub async fn forget(&self, id: &TargetId) {
        self.statuses.write().await.remove(id);
    }
}
