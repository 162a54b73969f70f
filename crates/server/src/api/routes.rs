use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use mixdown_core::StageRunner;

use super::{compositions, handlers, middleware, system, tasks};
use crate::state::AppState;

pub fn create_router<R: StageRunner + 'static>(state: Arc<AppState<R>>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Task submission
        .route("/compositions", post(compositions::create_composition))
        .route("/downloads", post(tasks::create_download))
        .route("/transcriptions", post(tasks::create_transcription))
        .route("/keyframes", post(tasks::create_keyframes))
        // Task lifecycle
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}", delete(tasks::delete_task))
        .route("/tasks/{id}/result", get(tasks::get_result))
        .route("/tasks/{id}/file", get(tasks::download_file))
        // System
        .route("/system/resources", get(system::get_resources))
        .route("/system/cleanup", post(system::run_cleanup))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::get_metrics))
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
