//! sms-sync library - offline-first state synchronization service
//!
//! Holds the school administration state in memory, mirrors it to a local
//! key-value store and reconciles it with the hosted backend on a timer.
//! Feature modules talk to it over the HTTP API below.

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod remote;
pub mod sync;

use sync::SyncManager;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SyncManager>,
}

impl AppState {
    pub fn new(manager: Arc<SyncManager>) -> Self {
        Self { manager }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let api = Router::new()
        .route("/api/sync/status", get(api::get_status))
        .route("/api/sync/refresh", post(api::refresh))
        .route(
            "/api/collections/:name",
            get(api::list_collection)
                .put(api::replace_collection)
                .delete(api::clear_collection),
        )
        .route(
            "/api/collections/:name/:id",
            put(api::upsert_record).delete(api::delete_record),
        )
        .route("/api/settings", get(api::get_settings).put(api::save_settings))
        .route(
            "/api/identity",
            get(api::get_identity).put(api::login).delete(api::logout),
        )
        .route("/api/identity/modules", get(api::get_modules))
        .route("/api/events", get(api::event_stream));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
