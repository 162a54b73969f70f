//! Types shared by stage runner implementations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Probed information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format name.
    pub format: String,
    /// Video codec if present.
    pub video_codec: Option<String>,
    /// Video width in pixels.
    pub video_width: Option<u32>,
    /// Video height in pixels.
    pub video_height: Option<u32>,
    /// Video frame rate.
    pub video_fps: Option<f32>,
    /// Audio codec if present.
    pub audio_codec: Option<String>,
    /// Audio sample rate in Hz.
    pub audio_sample_rate: Option<u32>,
    /// Audio channel count.
    pub audio_channels: Option<u8>,
}

impl MediaInfo {
    /// Whether the file carries a video stream.
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    /// Whether the file carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    /// Resolution as `WxH` when both dimensions are known.
    pub fn resolution(&self) -> Option<String> {
        match (self.video_width, self.video_height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

/// Result of one supervised stage execution.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Process exit code.
    pub exit_code: i32,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: u64,
    /// Last captured stderr lines (bounded).
    pub stderr_tail: Vec<String>,
}
