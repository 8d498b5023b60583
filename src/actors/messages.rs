//! Types exchanged between the supervisor, its workers and callers

use std::fmt;

use serde::Serialize;

use crate::TargetId;
use crate::query::QueryError;
use crate::storage::StorageError;

/// Why a single poll produced no (complete) result
///
/// Both variants are absorbed by the worker loop. They are kept apart so logs,
/// the status board and tests can tell an unreachable server from a failing
/// database.
#[derive(Debug)]
pub enum PollError {
    /// The status query failed; nothing was written
    Query(QueryError),

    /// The query succeeded but writing the sample or snapshot failed
    Persistence(StorageError),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Query(err) => write!(f, "query failed: {err}"),
            PollError::Persistence(err) => write!(f, "persisting poll result failed: {err}"),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Query(err) => Some(err),
            PollError::Persistence(err) => Some(err),
        }
    }
}

impl From<QueryError> for PollError {
    fn from(err: QueryError) -> Self {
        PollError::Query(err)
    }
}

impl From<StorageError> for PollError {
    fn from(err: StorageError) -> Self {
        PollError::Persistence(err)
    }
}

/// Errors returned synchronously by supervisor operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// An add was requested for an identity that already has a live worker
    AlreadyMonitored(String),

    /// An update/refresh/remove was requested for an identity without a worker
    NotMonitored(String),

    /// The supervisor has been shut down and starts no more workers
    ShuttingDown,
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::AlreadyMonitored(name) => {
                write!(f, "server '{name}' is already monitored")
            }
            SupervisorError::NotMonitored(name) => write!(f, "server '{name}' is not monitored"),
            SupervisorError::ShuttingDown => write!(f, "supervisor is shutting down"),
        }
    }
}

impl std::error::Error for SupervisorError {}

/// Public view of one live worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub target: TargetId,
    pub name: String,
    pub address: String,
    pub generation: u64,
}
