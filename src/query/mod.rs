//! Status queries against remote game servers
//!
//! The polling workers only depend on the [`QueryClient`] trait. The production
//! implementation is [`slp::SlpClient`], which speaks the Minecraft Server List
//! Ping protocol; tests substitute scripted clients.

pub mod address;
pub mod slp;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::StatusSample;

pub use address::ServerAddress;
pub use slp::SlpClient;

/// Result type alias for status queries
pub type QueryResult<T> = Result<T, QueryError>;

/// Reasons a single status query can fail
///
/// All of these are transient from the worker's point of view: the poll is
/// skipped and retried on the next interval.
#[derive(Debug)]
pub enum QueryError {
    /// The configured address could not be parsed
    InvalidAddress(String),

    /// The server did not answer within the client's timeout
    Timeout(Duration),

    /// Connecting, reading or writing failed
    Io(std::io::Error),

    /// The server answered with something that is not a status response
    Protocol(String),

    /// The status JSON could not be decoded
    Json(serde_json::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidAddress(addr) => write!(f, "invalid server address: {addr}"),
            QueryError::Timeout(after) => write!(f, "query timed out after {}ms", after.as_millis()),
            QueryError::Io(err) => write!(f, "I/O error: {err}"),
            QueryError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            QueryError::Json(err) => write!(f, "malformed status response: {err}"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Io(err) => Some(err),
            QueryError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Io(err)
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Json(err)
    }
}

/// Performs one status query against a server address
///
/// Implementations must bound themselves in time; callers do not add another
/// timeout layer on top.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(&self, address: &str) -> QueryResult<StatusSample>;
}
