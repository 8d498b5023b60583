pub mod actors;
pub mod api;
pub mod config;
pub mod query;
pub mod storage;
pub mod util;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Case-insensitive identity of a monitored target
///
/// Built from the target's display name by trimming and lowercasing it, so
/// `"Hypixel"` and `"hypixel"` address the same target everywhere (registry,
/// state store, history store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Result of one successful status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSample {
    pub online: u32,
    pub max: u32,
    /// Plain-text description (formatting codes stripped)
    pub description: String,
    /// Server icon as sent by the server (`data:image/png;base64,...`)
    pub favicon: Option<String>,
}

/// Live snapshot of a monitored target
///
/// Workers never mutate a shared `Target`; every successful poll derives a new
/// value via [`Target::observe`] and publishes it to the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Display name (identity is the case-folded form, see [`TargetId`])
    pub name: String,

    /// `host` or `host:port`
    pub address: String,

    pub online: u32,
    pub max: u32,
    pub description: Option<String>,
    pub favicon: Option<String>,

    /// Highest online count ever observed
    pub peak: u32,

    /// When `peak` was observed (creation time while `peak` is zero)
    pub peak_at: DateTime<Utc>,
}

impl Target {
    /// Create a fresh target with a zeroed snapshot
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            address: address.into().trim().to_string(),
            online: 0,
            max: 0,
            description: None,
            favicon: None,
            peak: 0,
            peak_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TargetId {
        TargetId::new(&self.name)
    }

    /// Derive the snapshot that results from observing `status` at `at`
    ///
    /// Player counts are always taken over. Description and favicon are only
    /// replaced when `refresh_metadata` is set (first success of a worker
    /// generation). The peak never decreases.
    pub fn observe(&self, status: &StatusSample, at: DateTime<Utc>, refresh_metadata: bool) -> Self {
        let mut next = self.clone();
        next.online = status.online;
        next.max = status.max;

        if refresh_metadata {
            next.description = Some(status.description.clone());
            next.favicon = status.favicon.clone();
        }

        if status.online > self.peak {
            next.peak = status.online;
            next.peak_at = at;
        }

        next
    }
}

/// One historical observation of a target's online count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub target: TargetId,
    pub timestamp: DateTime<Utc>,
    pub online: u32,
}

/// Publicly submitted request to have a server added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRequest {
    pub name: String,
    pub address: String,
    /// Online count observed when the request was validated
    pub online: u32,
    pub submitted_at: DateTime<Utc>,
}
