//! Persistence for target snapshots, sample history and add requests
//!
//! ## Design
//!
//! - **Trait-based**: `StateStore`, `HistoryStore` and `RequestStore` allow
//!   swapping implementations; the polling core never sees a concrete backend
//! - **Async**: All operations are async for compatibility with Tokio tasks
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database
//! - **In-Memory**: No persistence, for testing or throwaway deployments
//!
//! ## Usage
//!
//! ```no_run
//! use server_stats::storage::{Stores, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = std::sync::Arc::new(SqliteBackend::new("./server-stats.db").await?);
//!     let stores = Stores::from_backend(backend);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use backend::{HealthStatus, HistoryRange, HistoryStore, Page, RequestStore, StateStore};
pub use error::{StorageError, StorageResult};

/// The three stores, shared between the polling core and the API
#[derive(Clone)]
pub struct Stores {
    pub state: Arc<dyn StateStore>,
    pub history: Arc<dyn HistoryStore>,
    pub requests: Arc<dyn RequestStore>,
}

impl Stores {
    /// Use one backend for all three stores
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: StateStore + HistoryStore + RequestStore + 'static,
    {
        Self {
            state: backend.clone(),
            history: backend.clone(),
            requests: backend,
        }
    }
}
