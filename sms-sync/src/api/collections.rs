//! Collection read and write-through endpoints
//!
//! Every write replaces or edits one whole collection and reports what the
//! local store and the remote push did with it.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::{ApiError, ApiResult};
use crate::sync::{Collection, MutationOutcome};
use crate::AppState;

fn parse_collection(name: &str) -> ApiResult<Collection> {
    name.parse().map_err(ApiError::NotFound)
}

/// GET /api/collections/:name
pub async fn list_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let collection = parse_collection(&name)?;
    Ok(Json(state.manager.records(collection).await))
}

/// PUT /api/collections/:name
pub async fn replace_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> ApiResult<Json<MutationOutcome>> {
    let collection = parse_collection(&name)?;
    Ok(Json(state.manager.mutate(collection, records).await?))
}

/// DELETE /api/collections/:name
pub async fn clear_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MutationOutcome>> {
    let collection = parse_collection(&name)?;
    Ok(Json(state.manager.clear_collection(collection).await?))
}

/// PUT /api/collections/:name/:id
///
/// The body's `id` is set from the path.
pub async fn upsert_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Json(mut record): Json<Value>,
) -> ApiResult<Json<MutationOutcome>> {
    let collection = parse_collection(&name)?;
    let Some(fields) = record.as_object_mut() else {
        return Err(ApiError::BadRequest("Record must be a JSON object".to_string()));
    };
    fields.insert("id".to_string(), Value::String(id));
    Ok(Json(state.manager.upsert_record(collection, record).await?))
}

/// DELETE /api/collections/:name/:id
pub async fn delete_record(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<Json<MutationOutcome>> {
    let collection = parse_collection(&name)?;
    Ok(Json(state.manager.delete_record(collection, &id).await?))
}
