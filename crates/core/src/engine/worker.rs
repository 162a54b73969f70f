//! Background worker execution for each task kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compose::{CompositionRequest, SourceRef};
use crate::config::{EngineConfig, SubtitleConfig};
use crate::registry::{FailureKind, StageTiming, TaskFailure, TaskRegistry, TaskResult};
use crate::resolver::{ResolveError, ResolvedSource, Resolver};
use crate::runner::{RunnerError, StageRunner};
use crate::subtitle::{normalize_to_cues, to_srt, Cue};
use crate::synth::{CommandSynthesizer, PipelineStage, ResolvedInput};
use crate::transcribe::Transcriber;

use super::requests::{DownloadRequest, KeyframeRequest, TranscriptionRequest};

/// Shared dependencies cloned into each worker task.
pub(super) struct EngineCtx<R: StageRunner> {
    pub config: EngineConfig,
    pub subtitle: SubtitleConfig,
    pub registry: Arc<TaskRegistry>,
    pub runner: Arc<R>,
    pub synthesizer: Arc<CommandSynthesizer>,
    pub resolver: Arc<dyn Resolver>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

impl<R: StageRunner> EngineCtx<R> {
    fn workspace_for(&self, task_id: &str) -> PathBuf {
        self.config.temp_dir.join(task_id)
    }

    fn results_for(&self, task_id: &str) -> PathBuf {
        self.config.results_dir.join(task_id)
    }

    async fn prepare_workspace(&self, task_id: &str) -> Result<PathBuf, TaskFailure> {
        let workspace = self.workspace_for(task_id);
        tokio::fs::create_dir_all(&workspace)
            .await
            .map_err(|e| internal(format!("failed to create workspace: {}", e)))?;
        let _ = self.registry.add_temp_artifact(task_id, workspace.clone());
        Ok(workspace)
    }

    /// Claim the queued task; a false return means a cancellation won the
    /// race before the worker started.
    fn claim(&self, task_id: &str) -> Result<(), TaskFailure> {
        match self.registry.mark_running(task_id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TaskFailure::new(
                FailureKind::Cancelled,
                "task cancelled before it started",
            )),
            Err(e) => Err(internal(e.to_string())),
        }
    }

    async fn resolve(
        &self,
        source: &SourceRef,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedSource, TaskFailure> {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        self.resolver
            .resolve(source, workspace)
            .await
            .map_err(failure_from_resolve)
    }

    /// Execute a stage sequence, mapping each stage's progress into its
    /// proportional sub-range of the task's 0–100 scale. Unit 0 is reserved
    /// for input resolution, so a pipeline with N stages divides the scale
    /// into N+1 parts.
    async fn run_stages(
        &self,
        task_id: &str,
        stages: &[PipelineStage],
        cancel: &CancellationToken,
    ) -> Result<Vec<StageTiming>, TaskFailure> {
        let units = stages.len() as u32 + 1;
        let mut timings = Vec::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            materialize_stage_files(stage).await?;

            let base = ((index as u32 + 1) * 100) / units;
            let span = ((index as u32 + 2) * 100) / units - base;
            let _ = self.registry.update_progress(task_id, base as u8, &stage.name);

            let registry = Arc::clone(&self.registry);
            let id = task_id.to_string();
            let stage_name = stage.name.clone();
            let on_progress = move |percent: u8| {
                // 100 is reserved for the completion transition.
                let overall = (base + (percent as u32 * span) / 100).min(99);
                let _ = registry.update_progress(&id, overall as u8, &stage_name);
            };

            debug!(task = task_id, stage = %stage.name, "Running stage");
            let started = Instant::now();
            self.runner
                .run(stage, &on_progress, cancel)
                .await
                .map_err(failure_from_runner)?;

            let elapsed = started.elapsed();
            crate::metrics::STAGE_DURATION
                .with_label_values(&[&stage.name])
                .observe(elapsed.as_secs_f64());
            timings.push(StageTiming {
                name: stage.name.clone(),
                duration_ms: elapsed.as_millis() as u64,
            });
        }

        Ok(timings)
    }

    /// Move the final artifact into the durable results area and return its
    /// new path.
    async fn promote(&self, task_id: &str, artifact: &Path) -> Result<PathBuf, TaskFailure> {
        let results_dir = self.results_for(task_id);
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| internal(format!("failed to create results dir: {}", e)))?;

        let file_name = artifact
            .file_name()
            .ok_or_else(|| internal("final artifact has no file name"))?;
        let target = results_dir.join(file_name);
        move_file(artifact, &target)
            .await
            .map_err(|e| internal(format!("failed to move result: {}", e)))?;
        Ok(target)
    }

    /// Write the result metadata record next to the durable output.
    async fn write_metadata(&self, task_id: &str, result: &TaskResult) {
        let path = self.results_for(task_id).join("metadata.json");
        match serde_json::to_vec_pretty(result) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!("Failed to write metadata record: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize metadata record: {}", e),
        }
    }

    // ========================================================================
    // Per-kind workers
    // ========================================================================

    pub async fn run_composition(
        self: Arc<Self>,
        task_id: String,
        request: CompositionRequest,
        cancel: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        let started = Instant::now();
        self.claim(&task_id)?;
        let workspace = self.prepare_workspace(&task_id).await?;

        let _ = self
            .registry
            .update_progress(&task_id, 0, "resolving inputs");

        let mut inputs = Vec::with_capacity(request.inputs.len());
        for clip in &request.inputs {
            let resolved = self.resolve(&clip.source, &workspace, &cancel).await?;
            inputs.push(ResolvedInput {
                path: resolved.path,
                info: resolved.info,
            });
        }

        let audio = match &request.audio_track {
            Some(track) => {
                let resolved = self.resolve(&track.source, &workspace, &cancel).await?;
                Some(ResolvedInput {
                    path: resolved.path,
                    info: resolved.info,
                })
            }
            None => None,
        };

        let cues = match &request.subtitle_track {
            Some(track) => Some(load_subtitle_cues(
                &track.source,
                inputs.first().map(|i| i.info.duration_secs),
                audio.as_ref().map(|a| a.info.duration_secs),
                &self.subtitle,
            )?),
            None => None,
        };

        let stages = self
            .synthesizer
            .synthesize(
                &request,
                &inputs,
                audio.as_ref(),
                cues.as_deref(),
                &workspace,
            )
            .map_err(|e| TaskFailure::new(FailureKind::Validation, e.to_string()))?;

        let timings = self.run_stages(&task_id, &stages, &cancel).await?;

        let final_stage = stages.last().ok_or_else(|| internal("empty pipeline"))?;
        let output = self.promote(&task_id, &final_stage.output).await?;

        let file_size_bytes = tokio::fs::metadata(&output)
            .await
            .map(|m| m.len())
            .map_err(|e| internal(format!("result file missing: {}", e)))?;

        // Probe the durable output; fall back to the declared estimate when
        // the probe cannot see a duration.
        let (duration_secs, resolution) = match self.runner.probe(&output).await {
            Ok(info) if info.duration_secs > 0.0 => (info.duration_secs, info.resolution()),
            _ => (
                final_stage.source_duration_secs.unwrap_or(0.0),
                None,
            ),
        };

        let result = TaskResult::Composition {
            output_file: output,
            file_size_bytes,
            duration_secs,
            resolution,
            processing_time_ms: started.elapsed().as_millis() as u64,
            stage_timings: timings,
        };
        self.write_metadata(&task_id, &result).await;
        info!(task = %task_id, mode = request.mode.as_str(), "Composition completed");
        Ok(result)
    }

    pub async fn run_download(
        self: Arc<Self>,
        task_id: String,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        self.claim(&task_id)?;
        let workspace = self.prepare_workspace(&task_id).await?;

        let _ = self.registry.update_progress(&task_id, 0, "fetching source");
        let resolved = self.resolve(&request.source, &workspace, &cancel).await?;
        let _ = self.registry.update_progress(&task_id, 80, "storing result");

        // A local source resolves in place; copy it so the durable result
        // does not alias a client-owned file.
        let in_workspace = resolved.path.starts_with(&workspace);
        let output = if in_workspace {
            self.promote(&task_id, &resolved.path).await?
        } else {
            let results_dir = self.results_for(&task_id);
            tokio::fs::create_dir_all(&results_dir)
                .await
                .map_err(|e| internal(e.to_string()))?;
            let file_name = resolved
                .path
                .file_name()
                .ok_or_else(|| internal("source has no file name"))?;
            let target = results_dir.join(file_name);
            tokio::fs::copy(&resolved.path, &target)
                .await
                .map_err(|e| internal(format!("failed to copy result: {}", e)))?;
            target
        };

        let file_size_bytes = tokio::fs::metadata(&output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let result = TaskResult::Download {
            output_file: output,
            file_size_bytes,
            duration_secs: resolved.info.duration_secs,
            title: resolved.title,
        };
        self.write_metadata(&task_id, &result).await;
        Ok(result)
    }

    pub async fn run_transcription(
        self: Arc<Self>,
        task_id: String,
        request: TranscriptionRequest,
        cancel: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        let transcriber = self
            .transcriber
            .clone()
            .ok_or_else(|| internal("transcriber not configured"))?;

        self.claim(&task_id)?;
        let workspace = self.prepare_workspace(&task_id).await?;

        let _ = self.registry.update_progress(&task_id, 0, "resolving source");
        let resolved = self.resolve(&request.source, &workspace, &cancel).await?;

        let audio_path = workspace.join("audio.wav");
        let extract = self.synthesizer.audio_extract_stage(
            &ResolvedInput {
                path: resolved.path.clone(),
                info: resolved.info.clone(),
            },
            &audio_path,
        );
        self.run_stages(&task_id, std::slice::from_ref(&extract), &cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let _ = self.registry.update_progress(&task_id, 60, "transcribing");

        let transcript = transcriber
            .transcribe(&audio_path)
            .await
            .map_err(|e| TaskFailure::new(FailureKind::ProcessFailure, e.to_string()))?;

        let _ = self.registry.update_progress(&task_id, 90, "storing result");
        let results_dir = self.results_for(&task_id);
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| internal(e.to_string()))?;
        let srt_file = results_dir.join("transcript.srt");
        tokio::fs::write(&srt_file, to_srt(&transcript.cues))
            .await
            .map_err(|e| internal(format!("failed to write transcript: {}", e)))?;

        let result = TaskResult::Transcription {
            text: transcript.text,
            language: transcript.language,
            cue_count: transcript.cues.len(),
            srt_file,
        };
        self.write_metadata(&task_id, &result).await;
        Ok(result)
    }

    pub async fn run_keyframes(
        self: Arc<Self>,
        task_id: String,
        request: KeyframeRequest,
        cancel: CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        self.claim(&task_id)?;
        let workspace = self.prepare_workspace(&task_id).await?;

        let _ = self.registry.update_progress(&task_id, 0, "resolving source");
        let resolved = self.resolve(&request.source, &workspace, &cancel).await?;

        let frames_dir = workspace.join("frames");
        tokio::fs::create_dir_all(&frames_dir)
            .await
            .map_err(|e| internal(e.to_string()))?;

        let stage = self.synthesizer.keyframe_stage(
            &ResolvedInput {
                path: resolved.path,
                info: resolved.info,
            },
            request.interval_secs,
            &frames_dir,
        );
        self.run_stages(&task_id, std::slice::from_ref(&stage), &cancel)
            .await?;

        let _ = self.registry.update_progress(&task_id, 90, "storing frames");
        let results_dir = self.results_for(&task_id);
        tokio::fs::create_dir_all(&results_dir)
            .await
            .map_err(|e| internal(e.to_string()))?;

        let mut frames = Vec::new();
        let mut entries = tokio::fs::read_dir(&frames_dir)
            .await
            .map_err(|e| internal(e.to_string()))?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let target = results_dir.join(&name);
            move_file(&entry.path(), &target)
                .await
                .map_err(|e| internal(format!("failed to move frame: {}", e)))?;
            frames.push(target);
        }
        frames.sort();

        let result = TaskResult::Keyframes {
            directory: results_dir,
            frames,
        };
        self.write_metadata(&task_id, &result).await;
        Ok(result)
    }
}

/// Write declared manifest and cue files before a stage spawns.
async fn materialize_stage_files(stage: &PipelineStage) -> Result<(), TaskFailure> {
    if let Some(manifest) = &stage.manifest {
        tokio::fs::write(&manifest.path, manifest.render())
            .await
            .map_err(|e| internal(format!("failed to write concat manifest: {}", e)))?;
    }
    if let Some(cue_file) = &stage.cue_file {
        tokio::fs::write(&cue_file.path, to_srt(&cue_file.cues))
            .await
            .map_err(|e| internal(format!("failed to write subtitle file: {}", e)))?;
    }
    Ok(())
}

/// Load and normalize the subtitle track. Only local subtitle files are
/// accepted; the cue window is bounded by the shorter media stream when
/// both durations are known.
fn load_subtitle_cues(
    source: &SourceRef,
    video_duration: Option<f64>,
    audio_duration: Option<f64>,
    config: &SubtitleConfig,
) -> Result<Vec<Cue>, TaskFailure> {
    let path = match source {
        SourceRef::Local(path) => path,
        SourceRef::Url(url) => {
            return Err(TaskFailure::new(
                FailureKind::Validation,
                format!("subtitle track must be a local file, got URL {}", url),
            ));
        }
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        TaskFailure::new(
            FailureKind::SourceUnavailable,
            format!("failed to read subtitle file {}: {}", path.display(), e),
        )
    })?;

    let window = match (video_duration, audio_duration) {
        (Some(v), Some(a)) => Some(v.min(a)),
        (Some(v), None) => Some(v),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    };

    normalize_to_cues(path, &content, window, config)
        .map_err(|e| TaskFailure::new(FailureKind::Validation, e.to_string()))
}

/// Rename, falling back to copy+remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

fn internal(message: impl Into<String>) -> TaskFailure {
    TaskFailure::new(FailureKind::Internal, message)
}

fn cancelled() -> TaskFailure {
    TaskFailure::new(FailureKind::Cancelled, "task cancelled by client")
}

fn failure_from_resolve(error: ResolveError) -> TaskFailure {
    match &error {
        ResolveError::SourceUnavailable { .. } => {
            TaskFailure::new(FailureKind::SourceUnavailable, error.to_string())
        }
        ResolveError::SourceTooLong { .. } => {
            TaskFailure::new(FailureKind::SourceTooLong, error.to_string())
        }
        ResolveError::Io(_) => internal(error.to_string()),
    }
}

fn failure_from_runner(error: RunnerError) -> TaskFailure {
    match error {
        RunnerError::Timeout { .. } => TaskFailure::new(FailureKind::Timeout, error.to_string()),
        RunnerError::Cancelled { .. } => cancelled(),
        RunnerError::StageFailed {
            ref stderr_tail, ..
        } => {
            let tail = stderr_tail.clone();
            TaskFailure::with_stderr(FailureKind::ProcessFailure, error.to_string(), tail)
        }
        RunnerError::FfmpegNotFound { .. }
        | RunnerError::FfprobeNotFound { .. }
        | RunnerError::InputNotFound { .. }
        | RunnerError::ProbeFailed { .. }
        | RunnerError::ParseError { .. } => {
            TaskFailure::new(FailureKind::ProcessFailure, error.to_string())
        }
        RunnerError::Io(_) => internal(error.to_string()),
    }
}
