//! REST API for the stats hub
//!
//! Read-only routes go straight to the stores. Mutating routes persist the
//! change and then drive the [`Supervisor`](crate::actors::Supervisor).
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Supervisor handle** for starting, replacing and stopping pollers
//! - **Bearer token** guarding the admin routes
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Number of servers and players online
//! - `GET /api/v1/server?name=` - One server
//! - `GET /api/v1/servers?page=&page_size=` - Servers by players online
//! - `GET /api/v1/server-names` - All server names
//! - `GET /api/v1/servers/:name/history` - Online count history
//! - `GET /api/v1/servers/:name/status` - Poller status
//! - `POST|PUT|DELETE /api/v1/servers` - Add, modify, delete (admin)
//! - `PUT /api/v1/servers/refresh` - Restart a poller (admin)
//! - `POST /api/v1/server-requests` - Public add request
//! - `GET /api/v1/server-requests` - List add requests (admin)

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{
    AddServerRequest, DeleteServerRequest, GenericResponse, HealthResponse, HistoryResponse,
    ModifyServerRequest, RefreshServerRequest, ServerStatusResponse, ServersResponse,
    StatsResponse,
};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post, put},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::{info, warn};

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Bearer token for admin routes; admin routes are open without one
    pub auth_token: Option<String>,

    /// Enable CORS for browser frontends
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ApiSettings::default())
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            auth_token: settings.admin_token.clone(),
            enable_cors: settings.enable_cors,
        }
    }
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut admin = Router::new()
        .route(
            "/api/v1/servers",
            post(routes::servers::add_server)
                .put(routes::servers::modify_server)
                .delete(routes::servers::delete_server),
        )
        .route(
            "/api/v1/servers/refresh",
            put(routes::servers::refresh_server),
        )
        .route(
            "/api/v1/server-requests",
            get(routes::requests::list_requests),
        );

    match config.auth_token {
        Some(token) => {
            admin = admin.route_layer(axum::middleware::from_fn_with_state(
                token,
                middleware::auth::auth_middleware,
            ));
        }
        None => warn!("no admin token configured, admin routes are open"),
    }

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/server", get(routes::servers::get_server))
        .route("/api/v1/servers", get(routes::servers::list_servers))
        .route("/api/v1/server-names", get(routes::servers::list_names))
        .route(
            "/api/v1/servers/:name/history",
            get(routes::servers::get_history),
        )
        .route(
            "/api/v1/servers/:name/status",
            get(routes::servers::get_status),
        )
        .route(
            "/api/v1/server-requests",
            post(routes::requests::submit_request),
        )
        .merge(admin)
        .with_state(state);

    let cors = config.enable_cors.then(|| {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    });

    let app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .option_layer(cors),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
