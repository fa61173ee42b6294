//! Branding settings endpoints

use axum::{extract::State, Json};

use super::ApiResult;
use crate::sync::Branding;
use crate::AppState;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<Branding> {
    Json(state.manager.branding().await)
}

/// PUT /api/settings
///
/// Local fields are updated even when the remote upsert fails (502).
pub async fn save_settings(
    State(state): State<AppState>,
    Json(branding): Json<Branding>,
) -> ApiResult<Json<Branding>> {
    state.manager.save_settings(branding).await?;
    Ok(Json(state.manager.branding().await))
}
