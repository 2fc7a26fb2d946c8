//! Queue observability endpoint

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::db;
use crate::state::AppState;

use super::ApiResult;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub queue_stats: HashMap<String, i64>,
}

/// GET /api/v1/queue/status
pub async fn queue_status(State(state): State<AppState>) -> ApiResult<QueueStatusResponse> {
    let queue_stats = db::queue::stats(&state.pool).await?;
    Ok(Json(QueueStatusResponse { queue_stats }))
}
