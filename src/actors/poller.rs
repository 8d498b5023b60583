//! TargetPoller - one polling loop per monitored target
//!
//! ## Lifecycle
//!
//! ```text
//! spawn ─▶ Starting (random jitter) ─▶ Querying ⇄ Sleeping ─▶ Stopped
//!               │                         │          │
//!               └──────── cancellation token ────────┘
//! ```
//!
//! Every suspension point races the cancellation token, so a stop request is
//! observed without waiting out the interval. Once the token is observed the
//! poller performs no further writes.
//!
//! A failed query or a failed write never ends the loop. Both are logged and
//! reported to the [`PollStatusBoard`], then the poller sleeps and tries again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::messages::PollError;
use super::status::PollStatusBoard;
use crate::config::PollingConfig;
use crate::query::{QueryClient, QueryResult};
use crate::storage::{StorageResult, Stores};
use crate::{Sample, StatusSample, Target, TargetId};

/// Timing of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause between two queries
    pub interval: Duration,

    /// Bounds of the random delay before the first query
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl PollSettings {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            jitter_min: Duration::from_secs(config.jitter_min_secs),
            jitter_max: Duration::from_secs(config.jitter_max_secs),
        }
    }

    /// Draw a start-up delay uniformly from `[jitter_min, jitter_max]`
    pub fn jitter(&self) -> Duration {
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        if max <= min {
            return self.jitter_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

/// Everything a poller needs besides its target
#[derive(Clone)]
pub struct PollerContext {
    pub client: Arc<dyn QueryClient>,
    pub stores: Stores,
    pub status: Arc<PollStatusBoard>,
    pub settings: PollSettings,
}

/// Polling loop bound to exactly one target and one generation
pub struct TargetPoller {
    id: TargetId,

    /// Latest snapshot this poller published (or loaded)
    snapshot: Target,

    generation: u64,
    ctx: PollerContext,
    cancel: CancellationToken,

    /// Set once the first successful poll of this generation was persisted
    metadata_initialized: bool,

    /// Timestamp of the last appended sample for this identity
    last_sample_at: Option<DateTime<Utc>>,
}

impl TargetPoller {
    pub fn new(
        target: Target,
        generation: u64,
        ctx: PollerContext,
        cancel: CancellationToken,
        resume_after: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: target.id(),
            snapshot: target,
            generation,
            ctx,
            cancel,
            metadata_initialized: false,
            last_sample_at: resume_after,
        }
    }

    /// Run until cancelled
    ///
    /// Returns the timestamp of the last sample appended for this identity, so a
    /// replacement poller can keep timestamps strictly increasing.
    #[instrument(skip(self), fields(target = %self.snapshot.name, generation = self.generation))]
    pub async fn run(mut self) -> Option<DateTime<Utc>> {
        self.ctx
            .status
            .worker_started(&self.id, self.generation)
            .await;

        let jitter = self.ctx.settings.jitter();
        debug!("waiting {}ms before the first query", jitter.as_millis());

        if !self.pause(jitter).await {
            debug!("cancelled before the first query");
            return self.last_sample_at;
        }

        self.reload_snapshot().await;

        info!(
            "polling {} every {}s",
            self.snapshot.address,
            self.ctx.settings.interval.as_secs()
        );

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.ctx.client.query(&self.snapshot.address) => result,
            };

            // the token may have fired while the query was completing
            if self.cancel.is_cancelled() {
                break;
            }

            match self.apply(result).await {
                Ok(sample) => {
                    trace!("recorded sample (players online: {})", sample.online);
                    self.ctx.status.record_success(&sample).await;
                }
                Err(PollError::Query(e)) => {
                    warn!("failed to query {}: {}", self.snapshot.address, e);
                    self.ctx.status.record_query_failure(&self.id, &e).await;
                }
                Err(PollError::Persistence(e)) => {
                    error!("failed to persist poll result: {}", e);
                    self.ctx.status.record_persistence_failure(&self.id, &e).await;
                }
            }

            if !self.pause(self.ctx.settings.interval).await {
                break;
            }
        }

        debug!("poller stopped");
        self.last_sample_at
    }

    /// Sleep for `duration`; returns `false` if cancelled first
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Pick up the persisted snapshot, keeping this poller's address
    ///
    /// The previous generation may have raised the peak after the caller read
    /// the target it handed to the supervisor.
    async fn reload_snapshot(&mut self) {
        match self.ctx.stores.state.get(&self.id).await {
            Ok(Some(stored)) => {
                let address = std::mem::take(&mut self.snapshot.address);
                self.snapshot = Target { address, ..stored };
            }
            Ok(None) => trace!("no stored snapshot, starting from the given target"),
            Err(e) => {
                error!("failed to load stored snapshot: {}", e);
                self.ctx.status.record_persistence_failure(&self.id, &e).await;
            }
        }
    }

    async fn apply(&mut self, result: QueryResult<StatusSample>) -> Result<Sample, PollError> {
        let status = result?;
        Ok(self.record(status).await?)
    }

    /// Append the sample, then publish the derived snapshot
    async fn record(&mut self, status: StatusSample) -> StorageResult<Sample> {
        let timestamp = self.next_timestamp();
        let sample = Sample {
            target: self.id.clone(),
            timestamp,
            online: status.online,
        };

        self.ctx.stores.history.append(&sample).await?;
        self.last_sample_at = Some(timestamp);

        let refresh_metadata = !self.metadata_initialized;
        if refresh_metadata {
            debug!("updating metadata for '{}'", self.snapshot.name);
        }

        let snapshot = self.snapshot.observe(&status, timestamp, refresh_metadata);
        self.ctx.stores.state.upsert(&snapshot).await?;

        self.snapshot = snapshot;
        self.metadata_initialized = true;

        Ok(sample)
    }

    /// Millisecond timestamp strictly after the previous sample
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(3);
        match self.last_sample_at {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        }
    }
}

/// Handle to a running [`TargetPoller`]
pub struct PollerHandle {
    target: Target,
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<Option<DateTime<Utc>>>,
}

impl PollerHandle {
    /// Spawn a poller as a tokio task
    pub fn spawn(
        target: Target,
        generation: u64,
        ctx: PollerContext,
        resume_after: Option<DateTime<Utc>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let poller = TargetPoller::new(
            target.clone(),
            generation,
            ctx,
            cancel.clone(),
            resume_after,
        );

        let task = tokio::spawn(poller.run());

        Self {
            target,
            generation,
            cancel,
            task,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the poller and wait until it has stopped
    ///
    /// Returns the timestamp of the last sample the poller appended.
    pub async fn stop(self) -> Option<DateTime<Utc>> {
        self.cancel.cancel();
        match self.task.await {
            Ok(last_sample_at) => last_sample_at,
            Err(e) => {
                error!("poller for '{}' ended abnormally: {}", self.target.name, e);
                None
            }
        }
    }
}
