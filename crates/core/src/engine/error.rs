//! Engine-level errors returned synchronously from submission.
//!
//! Everything that happens after admission is recorded on the task instead
//! and surfaced through status queries.

use thiserror::Error;

/// Errors returned directly by `submit`/`get`/`delete`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Structurally invalid request; no task record was created.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Admission denied; the client should retry later with backoff.
    /// No task record was created.
    #[error("resource exhausted: {reason}")]
    ResourceExhausted { reason: String },

    /// Unknown task id.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Transcription requested but no transcriber is configured.
    #[error("transcription is not configured on this server")]
    TranscriberUnavailable,
}
