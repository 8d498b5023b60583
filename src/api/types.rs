//! API request and response types

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::error::{ApiError, ApiResult};
use crate::actors::PollStatus;
use crate::query::ServerAddress;
use crate::{Sample, Target, TargetRequest};

/// 1-32 letters, digits, spaces, `_`, `.` or `-`
static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _.\-]{1,32}$"));

/// Check a trimmed server name against [`NAME_PATTERN`]
pub fn validate_name(name: &str) -> ApiResult<&str> {
    let name = name.trim();
    let pattern = NAME_PATTERN.as_ref().map_err(|e| {
        error!("invalid server name pattern: {}", e);
        ApiError::Internal("server name validation unavailable".to_string())
    })?;

    if pattern.is_match(name) {
        Ok(name)
    } else {
        Err(ApiError::InvalidRequest(format!(
            "invalid server name '{name}'"
        )))
    }
}

pub fn validate_address(address: &str) -> ApiResult<&str> {
    let address = address.trim();
    address
        .parse::<ServerAddress>()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    Ok(address)
}

// ============================================================================
// Requests
// ============================================================================

/// Body of `POST /api/v1/servers` and `POST /api/v1/server-requests`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddServerRequest {
    pub name: String,
    pub address: String,
}

impl AddServerRequest {
    /// The validated target this request describes
    pub fn target(&self) -> ApiResult<Target> {
        Ok(Target::new(
            validate_name(&self.name)?,
            validate_address(&self.address)?,
        ))
    }
}

/// Body of `PUT /api/v1/servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyServerRequest {
    pub name: String,
    pub address: String,
}

/// Body of `PUT /api/v1/servers/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshServerRequest {
    pub name: String,
}

/// Body of `DELETE /api/v1/servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteServerRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerQuery {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServersQuery {
    #[serde(default)]
    pub page: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    /// Defaults to 24 hours before `end`
    pub start: Option<DateTime<Utc>>,

    /// Defaults to now
    pub end: Option<DateTime<Utc>>,

    pub limit: Option<usize>,
}

// ============================================================================
// Responses
// ============================================================================

/// Outcome of a mutating request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub message: String,
}

impl GenericResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
}

/// Response for GET /api/v1/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub servers: u64,
    pub players_online: u64,
}

/// Response for GET /api/v1/servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersResponse {
    pub servers: Vec<Target>,
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
}

/// Response for GET /api/v1/servers/:name/history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
    pub samples: Vec<Sample>,
}

/// Response for GET /api/v1/servers/:name/status
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusResponse {
    pub name: String,
    pub monitored: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollStatus>,
}

/// Response for GET /api/v1/server-requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestsResponse {
    pub requests: Vec<TargetRequest>,
    pub count: usize,
}
