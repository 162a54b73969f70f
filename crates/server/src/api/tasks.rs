//! Task API handlers: submission of non-composition kinds, status queries,
//! result retrieval and deletion.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use mixdown_core::{
    DownloadRequest, KeyframeRequest, StageRunner, Task, TaskFailure, TaskKind, TaskResult,
    TaskStatus, TranscriptionRequest,
};

use crate::state::AppState;

use super::{engine_error, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for task submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// Response for task status queries
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            status: task.status,
            progress: task.progress,
            stage: task.stage,
            error: task.error,
            created_at: task.created_at.to_rfc3339(),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: usize,
}

/// Response for completed-task results
#[derive(Debug, Serialize)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub result: TaskResult,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a download task
pub async fn create_download<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(request): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.engine().submit_download(request) {
        Ok(task_id) => Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id }))),
        Err(e) => Err(engine_error(e)),
    }
}

/// Submit a transcription task
pub async fn create_transcription<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(request): Json<TranscriptionRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.engine().submit_transcription(request) {
        Ok(task_id) => Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id }))),
        Err(e) => Err(engine_error(e)),
    }
}

/// Submit a keyframe-extraction task
pub async fn create_keyframes<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(request): Json<KeyframeRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.engine().submit_keyframes(request) {
        Ok(task_id) => Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id }))),
        Err(e) => Err(engine_error(e)),
    }
}

/// List all known tasks
pub async fn list_tasks<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<ListTasksResponse> {
    let tasks: Vec<TaskResponse> = state
        .engine()
        .tasks()
        .into_iter()
        .map(TaskResponse::from)
        .collect();
    let total = tasks.len();
    Json(ListTasksResponse { tasks, total })
}

/// Get one task's status and progress
pub async fn get_task<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.engine().task(&id) {
        Ok(task) => Ok(Json(TaskResponse::from(task))),
        Err(e) => Err(engine_error(e)),
    }
}

/// Delete a task: cancels it when still active, removes record and durable
/// results when terminal
pub async fn delete_task<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match state.engine().delete(&id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(engine_error(e)),
    }
}

/// Get a completed task's result metadata
pub async fn get_result<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResultResponse>, (StatusCode, Json<ErrorResponse>)> {
    let task = state.engine().task(&id).map_err(engine_error)?;

    match task.result {
        Some(result) => Ok(Json(TaskResultResponse {
            task_id: id,
            result,
        })),
        None => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("task {} has no result (status: {:?})", id, task.status),
            }),
        )),
    }
}

/// Stream a completed task's durable output file unchanged
pub async fn download_file<R: StageRunner + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let task = state.engine().task(&id).map_err(engine_error)?;

    let file_path = task
        .result
        .as_ref()
        .and_then(|result| result.primary_file())
        .ok_or_else(|| {
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("task {} has no downloadable file", id),
                }),
            )
        })?;

    let file = tokio::fs::File::open(file_path).await.map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("result file unavailable: {}", e),
            }),
        )
    })?;

    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "result".to_string());

    let stream = ReaderStream::new(file);
    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];

    Ok((headers, Body::from_stream(stream)))
}
