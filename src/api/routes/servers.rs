//! Server listing, history and admin endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{
        AddServerRequest, DeleteServerRequest, GenericResponse, HistoryQuery, HistoryResponse,
        ModifyServerRequest, RefreshServerRequest, ServerQuery, ServerStatusResponse,
        ServersQuery, ServersResponse, validate_address, validate_name,
    },
};
use crate::storage::{HistoryRange, Page};
use crate::{Target, TargetId};

const MAX_PAGE_SIZE: usize = 100;
const MAX_HISTORY_LIMIT: usize = 10_000;

fn not_found(name: &str) -> ApiError {
    ApiError::NotFound(format!("server '{name}' not found"))
}

async fn stored_target(state: &ApiState, name: &str) -> ApiResult<Target> {
    state
        .stores
        .state
        .get(&TargetId::new(name))
        .await?
        .ok_or_else(|| not_found(name))
}

/// GET /api/v1/server?name=
pub async fn get_server(
    State(state): State<ApiState>,
    Query(query): Query<ServerQuery>,
) -> ApiResult<Json<Target>> {
    Ok(Json(stored_target(&state, &query.name).await?))
}

/// GET /api/v1/servers?page=&page_size=
///
/// Servers sorted by players online, most first
pub async fn list_servers(
    State(state): State<ApiState>,
    Query(query): Query<ServersQuery>,
) -> ApiResult<Json<ServersResponse>> {
    if query.page_size == 0 || query.page_size > MAX_PAGE_SIZE {
        return Err(ApiError::InvalidRequest(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let page = Page {
        page: query.page,
        size: query.page_size,
    };

    let servers = state.stores.state.list_page(page).await?;
    let total = state.stores.state.count().await?;

    Ok(Json(ServersResponse {
        servers,
        page: query.page,
        page_size: query.page_size,
        total,
    }))
}

/// GET /api/v1/server-names
pub async fn list_names(State(state): State<ApiState>) -> ApiResult<Json<Vec<String>>> {
    let mut names: Vec<String> = state
        .stores
        .state
        .list()
        .await?
        .into_iter()
        .map(|target| target.name)
        .collect();
    names.sort();

    Ok(Json(names))
}

/// GET /api/v1/servers/:name/history?start=&end=&limit=
///
/// Defaults to the last 24 hours
pub async fn get_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let target = stored_target(&state, &name).await?;

    let end = query.end.unwrap_or_else(Utc::now);
    let start = query.start.unwrap_or(end - Duration::hours(24));
    if start > end {
        return Err(ApiError::InvalidRequest(
            "start must not be after end".to_string(),
        ));
    }

    let limit = query.limit.unwrap_or(MAX_HISTORY_LIMIT);
    if limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must not exceed {MAX_HISTORY_LIMIT}"
        )));
    }

    let samples = state
        .stores
        .history
        .query_range(HistoryRange {
            target: target.id(),
            start,
            end,
            limit: Some(limit),
        })
        .await?;

    Ok(Json(HistoryResponse {
        name: target.name,
        start,
        end,
        count: samples.len(),
        samples,
    }))
}

/// GET /api/v1/servers/:name/status
///
/// Poller generation and poll outcome counters
pub async fn get_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServerStatusResponse>> {
    let id = TargetId::new(&name);
    let worker = state.supervisor.worker(&id).await;
    let poll = state.status.get(&id).await;

    if worker.is_none() && poll.is_none() {
        return Err(not_found(&name));
    }

    Ok(Json(ServerStatusResponse {
        name: worker.as_ref().map_or(name, |w| w.name.clone()),
        monitored: worker.is_some(),
        address: worker.as_ref().map(|w| w.address.clone()),
        generation: worker.as_ref().map(|w| w.generation),
        poll,
    }))
}

/// POST /api/v1/servers
///
/// Persist a zeroed snapshot and start polling it
pub async fn add_server(
    State(state): State<ApiState>,
    Json(request): Json<AddServerRequest>,
) -> ApiResult<Json<GenericResponse>> {
    let target = request.target()?;

    if state.stores.state.get(&target.id()).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "server with name '{}' already exists",
            target.name
        )));
    }

    state.stores.state.upsert(&target).await?;
    state.supervisor.add_target(target.clone()).await?;

    info!("added server '{}' ({})", target.name, target.address);
    Ok(Json(GenericResponse::new(format!(
        "Successfully added server '{}'",
        target.name
    ))))
}

/// PUT /api/v1/servers
///
/// Change the address of a server and restart its poller
pub async fn modify_server(
    State(state): State<ApiState>,
    Json(request): Json<ModifyServerRequest>,
) -> ApiResult<Json<GenericResponse>> {
    let name = validate_name(&request.name)?;
    let address = validate_address(&request.address)?;

    let stored = stored_target(&state, name).await?;
    let target = Target {
        address: address.to_string(),
        ..stored
    };

    // the supervisor persists the address between stopping the old poller and
    // starting the new one; writing here could overwrite the new poller's sample
    state.supervisor.update_target(target.clone()).await?;

    info!("modified server '{}' ({})", target.name, target.address);
    Ok(Json(GenericResponse::new(format!(
        "Successfully modified server '{}'",
        target.name
    ))))
}

/// PUT /api/v1/servers/refresh
///
/// Restart a poller so it picks up description and favicon again
pub async fn refresh_server(
    State(state): State<ApiState>,
    Json(request): Json<RefreshServerRequest>,
) -> ApiResult<Json<GenericResponse>> {
    let target = stored_target(&state, &request.name).await?;
    state.supervisor.refresh_target(&target.id()).await?;

    Ok(Json(GenericResponse::new(format!(
        "Successfully refreshed poller for server '{}'",
        target.name
    ))))
}

/// DELETE /api/v1/servers
///
/// Stop polling a server and delete its snapshot and history
pub async fn delete_server(
    State(state): State<ApiState>,
    Json(request): Json<DeleteServerRequest>,
) -> ApiResult<Json<GenericResponse>> {
    let target = stored_target(&state, &request.name).await?;
    let id = target.id();

    if let Err(e) = state.supervisor.remove_target(&id).await {
        warn!("{}, deleting stored data only", e);
    }

    state.stores.state.delete(&id).await?;
    let removed = state.stores.history.delete_all(&id).await?;

    info!("deleted server '{}' and {} records", target.name, removed);
    Ok(Json(GenericResponse::new(format!(
        "Successfully deleted server '{}' and {} records.",
        target.name, removed
    ))))
}
