//! Requests for the non-composition task kinds.

use serde::{Deserialize, Serialize};

use crate::compose::SourceRef;

/// Fetch a remote source into the durable results area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadRequest {
    pub source: SourceRef,
}

/// Transcribe a source's audio track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionRequest {
    pub source: SourceRef,
}

/// Extract keyframes from a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyframeRequest {
    pub source: SourceRef,

    /// Sample one frame per interval instead of taking every I-frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
}
