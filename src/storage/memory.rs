//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the hub with `"backend": "none"`
//!
//! All data is lost on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, HistoryRange, HistoryStore, Page, RequestStore, StateStore};
use super::error::{StorageError, StorageResult};
use crate::{Sample, Target, TargetId, TargetRequest};

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    targets: RwLock<HashMap<TargetId, Target>>,

    /// Samples per target, keyed by timestamp (millis) to keep them ordered
    samples: RwLock<HashMap<TargetId, BTreeMap<i64, Sample>>>,

    requests: RwLock<Vec<TargetRequest>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples stored for a target
    pub async fn sample_count(&self, id: &TargetId) -> usize {
        self.samples
            .read()
            .await
            .get(id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

fn by_online_desc(a: &Target, b: &Target) -> std::cmp::Ordering {
    b.online
        .cmp(&a.online)
        .then_with(|| a.id().cmp(&b.id()))
}

#[async_trait]
impl StateStore for MemoryBackend {
    async fn get(&self, id: &TargetId) -> StorageResult<Option<Target>> {
        Ok(self.targets.read().await.get(id).cloned())
    }

    async fn upsert(&self, target: &Target) -> StorageResult<()> {
        let mut targets = self.targets.write().await;
        let mut next = target.clone();
        if let Some(existing) = targets.get(&target.id()) {
            next.name = existing.name.clone();
        }
        targets.insert(target.id(), next);
        Ok(())
    }

    async fn delete(&self, id: &TargetId) -> StorageResult<bool> {
        Ok(self.targets.write().await.remove(id).is_some())
    }

    async fn list(&self) -> StorageResult<Vec<Target>> {
        let mut targets: Vec<Target> = self.targets.read().await.values().cloned().collect();
        targets.sort_by_key(Target::id);
        Ok(targets)
    }

    async fn list_page(&self, page: Page) -> StorageResult<Vec<Target>> {
        let mut targets: Vec<Target> = self.targets.read().await.values().cloned().collect();
        targets.sort_by(by_online_desc);
        Ok(targets
            .into_iter()
            .skip(page.offset())
            .take(page.size)
            .collect())
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.targets.read().await.len() as u64)
    }

    async fn total_online(&self) -> StorageResult<u64> {
        Ok(self
            .targets
            .read()
            .await
            .values()
            .map(|t| t.online as u64)
            .sum())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "targets".to_string(),
                    self.targets.read().await.len().to_string(),
                ),
            ]),
        })
    }
}

#[async_trait]
impl HistoryStore for MemoryBackend {
    async fn append(&self, sample: &Sample) -> StorageResult<()> {
        let mut samples = self.samples.write().await;
        let series = samples.entry(sample.target.clone()).or_default();
        let key = sample.timestamp.timestamp_millis();

        if series.contains_key(&key) {
            return Err(StorageError::Duplicate(format!(
                "{}@{}",
                sample.target, sample.timestamp
            )));
        }

        series.insert(key, sample.clone());
        Ok(())
    }

    async fn query_range(&self, range: HistoryRange) -> StorageResult<Vec<Sample>> {
        debug!("querying in-memory history for {}", range.target);

        let start = range.start.timestamp_millis();
        let end = range.end.timestamp_millis();
        if start > end {
            return Ok(Vec::new());
        }

        let samples = self
            .samples
            .read()
            .await
            .get(&range.target)
            .map(|series| {
                series
                    .range(start..=end)
                    .map(|(_, sample)| sample.clone())
                    .take(range.limit.unwrap_or(usize::MAX))
                    .collect()
            })
            .unwrap_or_default();

        Ok(samples)
    }

    async fn delete_all(&self, id: &TargetId) -> StorageResult<u64> {
        let removed = self
            .samples
            .write()
            .await
            .remove(id)
            .map(|series| series.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }
}

#[async_trait]
impl RequestStore for MemoryBackend {
    async fn submit(&self, request: &TargetRequest) -> StorageResult<()> {
        self.requests.write().await.push(request.clone());
        Ok(())
    }

    async fn list_requests(&self) -> StorageResult<Vec<TargetRequest>> {
        Ok(self.requests.read().await.clone())
    }
}
