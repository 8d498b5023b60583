//! Polling core: one supervisor, one poller task per monitored target
//!
//! ## Architecture Overview
//!
//! ```text
//!         API / hub startup
//!                 │ add / update / refresh / remove
//!         ┌───────▼────────┐
//!         │   Supervisor   │  registry: identity ─▶ PollerHandle
//!         └───────┬────────┘
//!                 │ spawns, cancels
//!     ┌───────────┼───────────┐
//!     ▼           ▼           ▼
//! ┌────────┐ ┌────────┐ ┌────────┐
//! │Poller A│ │Poller B│ │Poller N│   query ─▶ append sample ─▶ upsert snapshot
//! └───┬────┘ └───┬────┘ └───┬────┘
//!     └──────────┼──────────┘
//!                ▼
//!     StateStore / HistoryStore          PollStatusBoard (observability)
//! ```
//!
//! ## Guarantees
//!
//! - At most one poller per identity at any time; a replaced poller has
//!   stopped before its successor starts
//! - A stopped poller performs no further writes
//! - Sample timestamps of one identity are strictly increasing, across
//!   generations too
//! - Metadata (description, favicon) is taken from the first successful poll
//!   of each generation only

pub mod messages;
pub mod poller;
pub mod status;
pub mod supervisor;

pub use messages::{PollError, SupervisorError, WorkerInfo};
pub use poller::{PollSettings, PollerContext, PollerHandle, TargetPoller};
pub use status::{PollStatus, PollStatusBoard};
pub use supervisor::Supervisor;
