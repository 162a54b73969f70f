//! Task record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of asynchronous work a task performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Transcription,
    Download,
    KeyframeExtraction,
    Composition,
}

impl TaskKind {
    /// Returns the kind as a string (for metrics labels and filtering).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Transcription => "transcription",
            TaskKind::Download => "download",
            TaskKind::KeyframeExtraction => "keyframe_extraction",
            TaskKind::Composition => "composition",
        }
    }
}

/// Task lifecycle status. Transitions are strictly forward:
/// `queued → running → {completed, failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns true once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Why a task failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed request or unusable resolved media; never retried.
    Validation,
    /// Collaborator could not fetch the source.
    SourceUnavailable,
    /// Source duration over the configured ceiling.
    SourceTooLong,
    /// External tool exited non-zero.
    ProcessFailure,
    /// Stage exceeded its wall-clock budget.
    Timeout,
    /// Client-initiated cancellation.
    Cancelled,
    /// Unexpected internal error.
    Internal,
}

impl FailureKind {
    /// Returns the kind as a string (for metrics labels).
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::SourceUnavailable => "source_unavailable",
            FailureKind::SourceTooLong => "source_too_long",
            FailureKind::ProcessFailure => "process_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

/// Structured failure record attached to a failed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Bounded stderr tail from the failed stage, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

impl TaskFailure {
    /// Create a failure record without process output.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stderr_tail: None,
        }
    }

    /// Create a failure record carrying a stderr tail.
    pub fn with_stderr(kind: FailureKind, message: impl Into<String>, tail: String) -> Self {
        Self {
            kind,
            message: message.into(),
            stderr_tail: if tail.is_empty() { None } else { Some(tail) },
        }
    }
}

/// Timing of one executed pipeline stage, recorded in the result metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTiming {
    pub name: String,
    pub duration_ms: u64,
}

/// Success payload; the variant matches the task kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Composition {
        output_file: PathBuf,
        file_size_bytes: u64,
        duration_secs: f64,
        resolution: Option<String>,
        processing_time_ms: u64,
        stage_timings: Vec<StageTiming>,
    },
    Transcription {
        text: String,
        language: Option<String>,
        cue_count: usize,
        srt_file: PathBuf,
    },
    Download {
        output_file: PathBuf,
        file_size_bytes: u64,
        duration_secs: f64,
        title: Option<String>,
    },
    Keyframes {
        directory: PathBuf,
        frames: Vec<PathBuf>,
    },
}

impl TaskResult {
    /// The durable file a client downloads for this result, if one exists.
    pub fn primary_file(&self) -> Option<&PathBuf> {
        match self {
            TaskResult::Composition { output_file, .. } => Some(output_file),
            TaskResult::Download { output_file, .. } => Some(output_file),
            TaskResult::Transcription { srt_file, .. } => Some(srt_file),
            TaskResult::Keyframes { .. } => None,
        }
    }
}

/// One unit of asynchronous work.
///
/// `result` and `error` are mutually exclusive and both absent while the
/// status is non-terminal; a terminal record never changes again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Opaque unique identifier, immutable after creation.
    pub id: String,

    pub kind: TaskKind,

    pub status: TaskStatus,

    /// 0–100, non-decreasing while running, exactly 100 iff completed.
    pub progress: u8,

    /// Human-readable current phase.
    pub stage: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Filesystem paths owned exclusively by this task until cleanup.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temp_artifacts: Vec<PathBuf>,
}

impl Task {
    /// Returns true once the task reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
