//! Supervisor - owns the registry of pollers, one per target identity
//!
//! ## Registry
//!
//! Each identity maps to a slot guarded by its own async mutex. An operation
//! locks the slot for its whole duration (including waiting for a replaced
//! poller to stop), so operations on one identity are serialized while
//! operations on different identities proceed in parallel.
//!
//! ```text
//! add(A) ──┐                    ┌── update(B)
//!          ▼                    ▼
//!   slots: { a: Mutex<Slot>,  b: Mutex<Slot> }
//!                 │                  │
//!            PollerHandle       PollerHandle
//! ```
//!
//! A slot left without a poller is marked retired and removed from the map.
//! Anyone who was waiting on the retired slot starts over with a fresh one.
//!
//! [`Supervisor::shutdown`] closes the registry under the map lock, so an
//! operation racing the shutdown either gets its poller stopped by it or fails
//! with [`SupervisorError::ShuttingDown`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument};

use super::messages::{SupervisorError, WorkerInfo};
use super::poller::{PollerContext, PollerHandle};
use crate::{Target, TargetId};

#[derive(Default)]
struct Slot {
    worker: Option<PollerHandle>,
    retired: bool,
}

/// Starts, replaces and stops pollers
///
/// All operations return once the registry reflects the requested state.
pub struct Supervisor {
    ctx: PollerContext,
    slots: Mutex<HashMap<TargetId, Arc<Mutex<Slot>>>>,

    /// Only changed while holding the `slots` lock
    closed: AtomicBool,
}

impl Supervisor {
    pub fn new(ctx: PollerContext) -> Self {
        Self {
            ctx,
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &PollerContext {
        &self.ctx
    }

    /// Start polling a target that has no poller yet
    ///
    /// Returns the generation of the new poller (always 0).
    #[instrument(skip(self, target), fields(target = %target.name))]
    pub async fn add_target(&self, target: Target) -> Result<u64, SupervisorError> {
        let id = target.id();
        let mut slot = self.lock_slot(&id).await?;

        if slot.worker.is_some() {
            return Err(SupervisorError::AlreadyMonitored(target.name));
        }

        info!("starting poller for {}", target.address);
        slot.worker = Some(PollerHandle::spawn(target, 0, self.ctx.clone(), None));

        Ok(0)
    }

    /// Replace the poller of a target with one polling the new address
    ///
    /// The old poller has stopped before this returns and the stored snapshot,
    /// if any, already carries the new address. The new poller reloads
    /// metadata on its first successful poll.
    #[instrument(skip(self, target), fields(target = %target.name))]
    pub async fn update_target(&self, target: Target) -> Result<u64, SupervisorError> {
        let id = target.id();
        self.restart(&id, Some(target)).await
    }

    /// Restart the poller of a target with unchanged parameters
    ///
    /// Used to re-read metadata (description, favicon) that a running poller
    /// keeps frozen.
    #[instrument(skip(self))]
    pub async fn refresh_target(&self, id: &TargetId) -> Result<u64, SupervisorError> {
        self.restart(id, None).await
    }

    /// Stop polling a target
    ///
    /// Persisted data is left alone. Deleting it is up to the caller.
    #[instrument(skip(self))]
    pub async fn remove_target(&self, id: &TargetId) -> Result<(), SupervisorError> {
        let mut slot = self.lock_slot(id).await?;

        let Some(worker) = slot.worker.take() else {
            self.release(id, slot).await;
            return Err(SupervisorError::NotMonitored(id.to_string()));
        };

        worker.stop().await;
        self.ctx.status.forget(id).await;
        self.release(id, slot).await;

        info!("stopped poller");
        Ok(())
    }

    pub async fn is_monitored(&self, id: &TargetId) -> bool {
        self.worker(id).await.is_some()
    }

    /// Describe the live poller of a target, if any
    pub async fn worker(&self, id: &TargetId) -> Option<WorkerInfo> {
        let slot = self.slots.lock().await.get(id).cloned()?;
        let slot = slot.lock().await;
        slot.worker.as_ref().map(|worker| describe(id, worker))
    }

    /// Describe all live pollers, sorted by identity
    pub async fn workers(&self) -> Vec<WorkerInfo> {
        let slots: Vec<_> = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };

        let mut workers = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            let slot = slot.lock().await;
            if let Some(worker) = &slot.worker {
                workers.push(describe(&id, worker));
            }
        }

        workers.sort_by(|a, b| a.target.cmp(&b.target));
        workers
    }

    /// Stop every poller and wait for all of them
    ///
    /// Afterwards every operation fails with [`SupervisorError::ShuttingDown`].
    pub async fn shutdown(&self) {
        let slots: Vec<_> = {
            let mut slots = self.slots.lock().await;
            self.closed.store(true, Ordering::SeqCst);
            slots.drain().collect()
        };
        info!("stopping {} poller(s)", slots.len());

        let stops = slots.into_iter().map(|(id, slot)| async move {
            let mut slot = slot.lock_owned().await;
            slot.retired = true;
            if let Some(worker) = slot.worker.take() {
                worker.stop().await;
                debug!("stopped poller for '{}'", id);
            }
        });

        join_all(stops).await;
    }

    async fn restart(&self, id: &TargetId, target: Option<Target>) -> Result<u64, SupervisorError> {
        let mut slot = self.lock_slot(id).await?;

        let Some(previous) = slot.worker.take() else {
            self.release(id, slot).await;
            let name = target.map_or_else(|| id.to_string(), |t| t.name);
            return Err(SupervisorError::NotMonitored(name));
        };

        let readdressed = target.is_some();
        let target = target.unwrap_or_else(|| previous.target().clone());
        let generation = previous.generation() + 1;

        let last_sample_at = previous.stop().await;

        // nothing polls this identity right now, so the write cannot race a sample
        if readdressed {
            self.persist_address(&target).await;
        }

        info!("restarting poller for {} (generation {})", target.address, generation);
        slot.worker = Some(PollerHandle::spawn(
            target,
            generation,
            self.ctx.clone(),
            last_sample_at,
        ));

        Ok(generation)
    }

    /// Point the stored snapshot at the target's address
    ///
    /// Counts, peak and metadata of the stored snapshot are kept. Targets
    /// without a stored snapshot are left to their poller's first write.
    async fn persist_address(&self, target: &Target) {
        let id = target.id();
        let result = match self.ctx.stores.state.get(&id).await {
            Ok(Some(stored)) if stored.address == target.address => Ok(()),
            Ok(Some(stored)) => {
                let snapshot = Target {
                    address: target.address.clone(),
                    ..stored
                };
                self.ctx.stores.state.upsert(&snapshot).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!("failed to persist new address {}: {}", target.address, e);
            self.ctx.status.record_persistence_failure(&id, &e).await;
        }
    }

    /// Lock the live slot of an identity, creating it if needed
    async fn lock_slot(&self, id: &TargetId) -> Result<OwnedMutexGuard<Slot>, SupervisorError> {
        loop {
            let slot = {
                let mut slots = self.slots.lock().await;
                if self.closed.load(Ordering::SeqCst) {
                    return Err(SupervisorError::ShuttingDown);
                }
                slots.entry(id.clone()).or_default().clone()
            };

            let guard = slot.lock_owned().await;
            if !guard.retired {
                return Ok(guard);
            }
        }
    }

    /// Give a slot back, dropping it from the registry if it holds no poller
    async fn release(&self, id: &TargetId, mut slot: OwnedMutexGuard<Slot>) {
        if slot.worker.is_none() {
            slot.retired = true;
            self.slots.lock().await.remove(id);
        }
    }
}

fn describe(id: &TargetId, worker: &PollerHandle) -> WorkerInfo {
    WorkerInfo {
        target: id.clone(),
        name: worker.target().name.clone(),
        address: worker.target().address.clone(),
        generation: worker.generation(),
    }
}
