//! Speech transcription collaborator.
//!
//! The engine treats the transcriber as an opaque blocking call returning
//! text plus a timed cue list; the bundled implementation shells out to a
//! whisper CLI.

mod whisper;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::subtitle::Cue;

pub use whisper::WhisperCliTranscriber;

/// Errors from the transcription collaborator.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// Whisper binary not found.
    #[error("transcriber binary not found at path: {path}")]
    BinaryNotFound { path: std::path::PathBuf },

    /// The transcriber exited non-zero.
    #[error("transcription failed: {reason}")]
    Failed { reason: String },

    /// The transcriber exceeded its configured budget.
    #[error("transcription timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The transcriber's output could not be parsed.
    #[error("failed to parse transcriber output: {reason}")]
    ParseError { reason: String },

    /// I/O error around the transcriber invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A completed transcription.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Full transcribed text.
    pub text: String,
    /// Timed cues in order.
    pub cues: Vec<Cue>,
    /// Detected (or forced) language code.
    pub language: Option<String>,
}

/// Opaque speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the name of this transcriber implementation.
    fn name(&self) -> &str;

    /// Transcribe a mono 16 kHz WAV file.
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscribeError>;
}
