//! Logged-in identity and module visibility

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sms_common::models::{AuthUser, UserRole};

use super::{ApiError, ApiResult};
use crate::sync::{visible_modules, ModuleType};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ModuleEntry {
    pub module: ModuleType,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModulesResponse {
    pub role: UserRole,
    pub modules: Vec<ModuleEntry>,
}

/// GET /api/identity
pub async fn get_identity(State(state): State<AppState>) -> Json<Option<AuthUser>> {
    Json(state.manager.identity().await)
}

/// PUT /api/identity
pub async fn login(
    State(state): State<AppState>,
    Json(user): Json<AuthUser>,
) -> ApiResult<Json<AuthUser>> {
    if user.id.is_empty() {
        return Err(ApiError::BadRequest("Identity requires an id".to_string()));
    }
    state.manager.login(user.clone()).await?;
    Ok(Json(user))
}

/// DELETE /api/identity
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.manager.logout().await;
    StatusCode::NO_CONTENT
}

/// GET /api/identity/modules
pub async fn get_modules(State(state): State<AppState>) -> ApiResult<Json<ModulesResponse>> {
    let user = state
        .manager
        .identity()
        .await
        .ok_or_else(|| ApiError::NotFound("No identity is logged in".to_string()))?;

    let modules = visible_modules(user.role)
        .into_iter()
        .map(|module| ModuleEntry {
            module,
            label: module.label(),
        })
        .collect();

    Ok(Json(ModulesResponse {
        role: user.role,
        modules,
    }))
}
