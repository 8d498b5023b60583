use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./server-stats.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub query: QueryConfig,

    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    #[serde(default)]
    pub api: ApiSettings,

    /// Targets created on startup if they are not stored yet
    pub targets: Option<Vec<TargetConfig>>,
}

/// Timing of the per-target polling loops
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_jitter_min")]
    pub jitter_min_secs: u64,

    #[serde(default = "default_jitter_max")]
    pub jitter_max_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            jitter_min_secs: default_jitter_min(),
            jitter_max_secs: default_jitter_max(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_jitter_min() -> u64 {
    1
}

fn default_jitter_max() -> u64 {
    60
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_query_timeout")]
    pub timeout_secs: u64,

    /// Protocol version announced in the handshake (-1 = "just pinging")
    #[serde(default = "default_protocol_version")]
    pub protocol_version: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_query_timeout(),
            protocol_version: default_protocol_version(),
        }
    }
}

fn default_query_timeout() -> u64 {
    5
}

fn default_protocol_version() -> i32 {
    -1
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "crate::util::get_default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Bearer token required for admin routes
    pub admin_token: Option<String>,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Players a server needs online for a public add request to be accepted
    #[serde(default = "default_min_request_players")]
    pub min_request_players: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_default_bind_addr(),
            admin_token: None,
            enable_cors: default_enable_cors(),
            min_request_players: default_min_request_players(),
        }
    }
}

fn default_enable_cors() -> bool {
    true
}

fn default_min_request_players() -> u32 {
    50
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub address: String,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str::<Config>(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .and_then(|config| {
            if config.polling.jitter_min_secs > config.polling.jitter_max_secs {
                anyhow::bail!("polling.jitter_min_secs must not exceed polling.jitter_max_secs");
            }
            if config.polling.interval_secs == 0 {
                anyhow::bail!("polling.interval_secs must be at least 1");
            }
            Ok(config)
        })
        .inspect(|config| trace!("loaded config: {config:?}"))
}
