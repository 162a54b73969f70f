//! Mock stage runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::runner::{MediaInfo, ProgressFn, RunnerError, StageOutcome, StageRunner};
use crate::synth::PipelineStage;

/// Mock implementation of the StageRunner trait.
///
/// Provides controllable behavior for testing:
/// - Track executed stages for assertions
/// - Simulate success/failure per stage name
/// - Control probe results
/// - Honor cancellation tokens and explicit stage budgets
///
/// Successful runs touch the declared output file so downstream stages and
/// result finalization see real paths.
#[derive(Debug, Clone)]
pub struct MockStageRunner {
    executed: Arc<RwLock<Vec<PipelineStage>>>,
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    default_duration: Arc<std::sync::RwLock<f64>>,
    stage_delay: Arc<RwLock<Duration>>,
    fail_stage: Arc<RwLock<Option<String>>>,
    timeout_stage: Arc<RwLock<Option<String>>>,
}

impl Default for MockStageRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStageRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            executed: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            default_duration: Arc::new(std::sync::RwLock::new(30.0)),
            stage_delay: Arc::new(RwLock::new(Duration::from_millis(10))),
            fail_stage: Arc::new(RwLock::new(None)),
            timeout_stage: Arc::new(RwLock::new(None)),
        }
    }

    /// Stages executed so far.
    pub async fn executed_stages(&self) -> Vec<PipelineStage> {
        self.executed.read().await.clone()
    }

    /// Number of stages executed.
    pub async fn executed_count(&self) -> usize {
        self.executed.read().await.len()
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Duration reported by probes without an explicit result.
    pub fn set_default_duration(&self, secs: f64) {
        *self.default_duration.write().expect("duration lock poisoned") = secs;
    }

    /// Simulated execution time per stage.
    pub async fn set_stage_delay(&self, delay: Duration) {
        *self.stage_delay.write().await = delay;
    }

    /// Make the stage with this name fail with a process error.
    pub async fn fail_stage_named(&self, name: impl Into<String>) {
        *self.fail_stage.write().await = Some(name.into());
    }

    /// Make the stage with this name report a wall-clock timeout.
    pub async fn timeout_stage_named(&self, name: impl Into<String>) {
        *self.timeout_stage.write().await = Some(name.into());
    }

    fn synthetic_info(path: &Path, duration: f64) -> MediaInfo {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let (duration, video, audio) = match extension.as_str() {
            "jpg" | "jpeg" | "png" => (0.0, true, false),
            "mp3" | "wav" | "m4a" | "flac" => (duration, false, true),
            _ => (duration, true, true),
        };

        MediaInfo {
            path: path.to_path_buf(),
            size_bytes: 1024,
            duration_secs: duration,
            format: if extension.is_empty() {
                "mp4".to_string()
            } else {
                extension
            },
            video_codec: video.then(|| "h264".to_string()),
            video_width: video.then_some(1920),
            video_height: video.then_some(1080),
            video_fps: video.then_some(25.0),
            audio_codec: audio.then(|| "aac".to_string()),
            audio_sample_rate: audio.then_some(48000),
            audio_channels: audio.then_some(2),
        }
    }

    /// Touch the declared output so later stages and finalization find it.
    async fn materialize_output(stage: &PipelineStage) -> std::io::Result<()> {
        let pattern = stage.output.display().to_string();
        if pattern.contains('%') {
            // Image-sequence output: produce a couple of frames.
            if let Some(parent) = stage.output.parent() {
                tokio::fs::create_dir_all(parent).await?;
                for index in 1..=2 {
                    let name = pattern
                        .rsplit('/')
                        .next()
                        .unwrap_or("frame_%04d.jpg")
                        .replace("%04d", &format!("{:04}", index));
                    tokio::fs::write(parent.join(name), b"frame").await?;
                }
            }
            return Ok(());
        }

        if let Some(parent) = stage.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&stage.output, b"mock output").await
    }
}

#[async_trait]
impl StageRunner for MockStageRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, RunnerError> {
        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }
        let duration = *self.default_duration.read().expect("duration lock poisoned");
        Ok(Self::synthetic_info(path, duration))
    }

    async fn run(
        &self,
        stage: &PipelineStage,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome, RunnerError> {
        self.executed.write().await.push(stage.clone());

        let delay = *self.stage_delay.read().await;
        let budget = stage.timeout_secs.map(Duration::from_secs);
        let timed_out = matches!(budget, Some(b) if b < delay);
        let wait = if timed_out { budget.unwrap() } else { delay };

        // Two half-sleeps with a progress report in between.
        let half = wait / 2;
        tokio::select! {
            _ = tokio::time::sleep(half) => {}
            _ = cancel.cancelled() => {
                return Err(RunnerError::Cancelled { stage: stage.name.clone() });
            }
        }
        on_progress(50);
        tokio::select! {
            _ = tokio::time::sleep(half) => {}
            _ = cancel.cancelled() => {
                return Err(RunnerError::Cancelled { stage: stage.name.clone() });
            }
        }

        if timed_out {
            return Err(RunnerError::Timeout {
                stage: stage.name.clone(),
                budget_secs: stage.timeout_secs.unwrap_or(0),
            });
        }

        if let Some(timeout_name) = self.timeout_stage.read().await.as_deref() {
            if stage.name == timeout_name {
                return Err(RunnerError::Timeout {
                    stage: stage.name.clone(),
                    budget_secs: stage.timeout_secs.unwrap_or(1),
                });
            }
        }

        if let Some(fail_name) = self.fail_stage.read().await.as_deref() {
            if stage.name == fail_name {
                return Err(RunnerError::StageFailed {
                    stage: stage.name.clone(),
                    code: Some(1),
                    stderr_tail: "mock failure".to_string(),
                });
            }
        }

        Self::materialize_output(stage).await?;
        on_progress(100);

        Ok(StageOutcome {
            exit_code: 0,
            duration_ms: wait.as_millis() as u64,
            stderr_tail: Vec::new(),
        })
    }

    async fn validate(&self) -> Result<(), RunnerError> {
        Ok(())
    }
}
