//! Store trait definitions
//!
//! The polling core only talks to persistence through these traits. Both
//! backends (`memory`, `sqlite`) implement all of them on a single type.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use crate::{Sample, Target, TargetId, TargetRequest};

/// Query parameters for fetching samples within a time range
#[derive(Debug, Clone)]
pub struct HistoryRange {
    pub target: TargetId,

    /// Start of time range (inclusive)
    pub start: DateTime<Utc>,

    /// End of time range (inclusive)
    pub end: DateTime<Utc>,

    /// Maximum number of results to return
    pub limit: Option<usize>,
}

/// Zero-based page of targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub size: usize,
}

impl Page {
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Current snapshot per target
///
/// Implementations must tolerate concurrent writes for different targets.
/// Lookups by [`TargetId`] are case-insensitive.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, id: &TargetId) -> StorageResult<Option<Target>>;

    /// Insert or replace the snapshot for `target.id()`
    ///
    /// An existing record keeps its original display name.
    async fn upsert(&self, target: &Target) -> StorageResult<()>;

    /// Delete the snapshot; returns whether a record was removed
    async fn delete(&self, id: &TargetId) -> StorageResult<bool>;

    /// All targets, ordered by name
    async fn list(&self) -> StorageResult<Vec<Target>>;

    /// One page of targets, ordered by online count (descending), then name
    async fn list_page(&self, page: Page) -> StorageResult<Vec<Target>>;

    async fn count(&self) -> StorageResult<u64>;

    /// Sum of the online counts of all targets
    async fn total_online(&self) -> StorageResult<u64>;

    async fn health_check(&self) -> StorageResult<HealthStatus>;
}

/// Append-only sample history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one sample; `(target, timestamp)` must be unique
    async fn append(&self, sample: &Sample) -> StorageResult<()>;

    /// Samples in the range, oldest first
    async fn query_range(&self, range: HistoryRange) -> StorageResult<Vec<Sample>>;

    /// Remove every sample of a target; returns the number removed
    async fn delete_all(&self, id: &TargetId) -> StorageResult<u64>;
}

/// Publicly submitted add requests awaiting review
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn submit(&self, request: &TargetRequest) -> StorageResult<()>;

    /// All requests, oldest first
    async fn list_requests(&self) -> StorageResult<Vec<TargetRequest>>;
}
