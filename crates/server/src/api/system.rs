//! System endpoints: resource snapshot and manual cleanup.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use mixdown_core::{AdmissionVerdict, ResourceSample, StageRunner, SweepStats};

use crate::state::AppState;

/// Latest resource sample plus the current admission verdict.
#[derive(Debug, Serialize)]
pub struct ResourcesResponse {
    pub sample: ResourceSample,
    pub admission: AdmissionVerdict,
}

pub async fn get_resources<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<ResourcesResponse> {
    Json(ResourcesResponse {
        sample: state.monitor().latest(),
        admission: state.monitor().can_admit(),
    })
}

/// Response for a manual cleanup sweep.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub swept: SweepStats,
}

pub async fn run_cleanup<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<CleanupResponse> {
    let swept = state.janitor().sweep().await;
    Json(CleanupResponse { swept })
}
