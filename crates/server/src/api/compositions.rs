//! Composition submission handler.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use mixdown_core::{CompositionRequest, StageRunner};

use crate::state::AppState;

use super::tasks::SubmitResponse;
use super::{engine_error, ErrorResponse};

/// Submit a composition task.
///
/// The request body is one of the six tagged composition modes; validation
/// failures return 400, admission rejections 503, both without creating a
/// task record.
pub async fn create_composition<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(request): Json<CompositionRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.engine().submit_composition(request) {
        Ok(task_id) => Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id }))),
        Err(e) => Err(engine_error(e)),
    }
}
