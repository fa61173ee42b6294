//! Sync indicator and manual refresh

use axum::{extract::State, Json};
use tracing::info;

use super::ApiResult;
use crate::sync::{FetchOutcome, SyncStatus};
use crate::AppState;

/// GET /api/sync/status
pub async fn get_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.manager.status().await)
}

/// POST /api/sync/refresh
///
/// Runs a fetch cycle now. A failed cycle returns 502 with the same message
/// recorded as `sync_error`.
pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<FetchOutcome>> {
    info!("Manual refresh requested");
    let outcome = state.manager.fetch_cycle().await?;
    Ok(Json(outcome))
}
