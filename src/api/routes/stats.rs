//! Aggregate statistics endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::StatsResponse};

/// GET /api/v1/stats
///
/// Returns the number of stored servers and the sum of their players online
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let servers = state.stores.state.count().await?;
    let players_online = state.stores.state.total_online().await?;

    Ok(Json(StatsResponse {
        servers,
        players_online,
    }))
}
