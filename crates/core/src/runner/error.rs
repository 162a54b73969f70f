//! Error types for the stage runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from spawning or supervising an external stage process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Declared input file missing.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The stage process exited non-zero.
    #[error("Stage '{stage}' failed with exit code {code:?}")]
    StageFailed {
        stage: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// The stage exceeded its wall-clock budget.
    #[error("Stage '{stage}' timed out after {budget_secs} seconds")]
    Timeout { stage: String, budget_secs: u64 },

    /// The stage was cancelled by the client.
    #[error("Stage '{stage}' cancelled")]
    Cancelled { stage: String },

    /// Failed to probe a media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse tool output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// I/O error while supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Creates a probe failure.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }
}
