//! Mock transcriber for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::subtitle::Cue;
use crate::transcribe::{TranscribeError, Transcriber, Transcript};

/// Mock implementation of the Transcriber trait.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    transcript_text: Arc<RwLock<String>>,
    fail: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscriber {
    /// Create a mock returning a fixed two-cue transcript.
    pub fn new() -> Self {
        Self {
            transcript_text: Arc::new(RwLock::new(
                "Hello world. This is a test.".to_string(),
            )),
            fail: Arc::new(RwLock::new(false)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Override the returned text.
    pub async fn set_text(&self, text: impl Into<String>) {
        *self.transcript_text.write().await = text.into();
    }

    /// Make the next transcriptions fail.
    pub async fn set_failing(&self, failing: bool) {
        *self.fail.write().await = failing;
    }

    /// Audio paths transcribed so far.
    pub async fn transcribed_paths(&self) -> Vec<PathBuf> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscribeError> {
        self.calls.write().await.push(audio_path.to_path_buf());

        if *self.fail.read().await {
            return Err(TranscribeError::Failed {
                reason: "mock failure".to_string(),
            });
        }

        let text = self.transcript_text.read().await.clone();
        let cues = vec![
            Cue::new(0.0, 2.5, "Hello world."),
            Cue::new(2.5, 5.0, "This is a test."),
        ];

        Ok(Transcript {
            text,
            cues,
            language: Some("en".to_string()),
        })
    }
}
