//! Whisper CLI transcriber implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::subtitle::Cue;

use super::{TranscribeError, Transcriber, Transcript};

/// Whisper JSON output shape (shared by openai-whisper and whisper.cpp).
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Transcriber shelling out to a whisper CLI with JSON output.
pub struct WhisperCliTranscriber {
    config: TranscriberConfig,
}

impl WhisperCliTranscriber {
    /// Creates a transcriber with the given configuration.
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    fn parse_output(content: &str) -> Result<Transcript, TranscribeError> {
        let output: WhisperOutput =
            serde_json::from_str(content).map_err(|e| TranscribeError::ParseError {
                reason: e.to_string(),
            })?;

        let cues = output
            .segments
            .into_iter()
            .map(|segment| Cue::new(segment.start, segment.end, segment.text.trim().to_string()))
            .collect();

        Ok(Transcript {
            text: output.text.trim().to_string(),
            cues,
            language: output.language,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    fn name(&self) -> &str {
        "whisper-cli"
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscribeError> {
        let output_dir = tempfile::tempdir()?;
        info!(
            "Transcribing {} with model {}",
            audio_path.display(),
            self.config.model
        );

        let mut command = Command::new(&self.config.binary_path);
        command
            .arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir.path())
            .arg("--output_format")
            .arg("json");
        if let Some(language) = &self.config.language {
            command.arg("--language").arg(language);
        }

        let budget = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(budget, command.output()).await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscribeError::BinaryNotFound {
                    path: self.config.binary_path.clone(),
                });
            }
            Ok(Err(e)) => return Err(TranscribeError::Io(e)),
            Err(_) => {
                return Err(TranscribeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        if !output.status.success() {
            return Err(TranscribeError::Failed {
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stem = audio_path
            .file_stem()
            .ok_or_else(|| TranscribeError::Failed {
                reason: "audio path has no file stem".to_string(),
            })?;
        let json_path = output_dir
            .path()
            .join(format!("{}.json", stem.to_string_lossy()));
        debug!("Reading transcriber output {}", json_path.display());

        let content = tokio::fs::read_to_string(&json_path).await?;
        Self::parse_output(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        let json = r#"{
            "text": " Hello world. This is a test.",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.5, "text": " Hello world."},
                {"id": 1, "start": 2.5, "end": 5.0, "text": " This is a test."}
            ],
            "language": "en"
        }"#;

        let transcript = WhisperCliTranscriber::parse_output(json).unwrap();
        assert_eq!(transcript.text, "Hello world. This is a test.");
        assert_eq!(transcript.cues.len(), 2);
        assert_eq!(transcript.cues[0].text, "Hello world.");
        assert_eq!(transcript.cues[1].start, 2.5);
        assert_eq!(transcript.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        let err = WhisperCliTranscriber::parse_output("not json").unwrap_err();
        assert!(matches!(err, TranscribeError::ParseError { .. }));
    }
}
