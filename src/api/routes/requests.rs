//! Public add requests

use axum::{Json, extract::State};
use chrono::Utc;
use tracing::info;

use crate::TargetRequest;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{AddServerRequest, GenericResponse, RequestsResponse},
};

/// POST /api/v1/server-requests
///
/// Ping the server and store the request if enough players are online
pub async fn submit_request(
    State(state): State<ApiState>,
    Json(request): Json<AddServerRequest>,
) -> ApiResult<Json<GenericResponse>> {
    let target = request.target()?;

    let status = state
        .client
        .query(&target.address)
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("unable to ping server: {e}")))?;

    if status.online < state.min_request_players {
        return Err(ApiError::InvalidRequest(format!(
            "server must have at least {} players online (has {})",
            state.min_request_players, status.online
        )));
    }

    state
        .stores
        .requests
        .submit(&TargetRequest {
            name: target.name.clone(),
            address: target.address,
            online: status.online,
            submitted_at: Utc::now(),
        })
        .await?;

    info!("received add request for '{}'", target.name);
    Ok(Json(GenericResponse::new(format!(
        "Ping successful (players online: {}). The server has been submitted for review.",
        status.online
    ))))
}

/// GET /api/v1/server-requests
pub async fn list_requests(State(state): State<ApiState>) -> ApiResult<Json<RequestsResponse>> {
    let requests = state.stores.requests.list_requests().await?;

    Ok(Json(RequestsResponse {
        count: requests.len(),
        requests,
    }))
}
