//! Top-level coordinator: admission, worker dispatch, cancellation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compose::{validate_request, CompositionRequest};
use crate::config::{EngineConfig, SubtitleConfig};
use crate::metrics;
use crate::registry::{Task, TaskFailure, TaskKind, TaskRegistry, TaskResult};
use crate::resolver::Resolver;
use crate::resources::ResourceMonitor;
use crate::runner::StageRunner;
use crate::synth::CommandSynthesizer;
use crate::transcribe::Transcriber;

use super::error::EngineError;
use super::requests::{DownloadRequest, KeyframeRequest, TranscriptionRequest};
use super::worker::EngineCtx;

/// The composition and task orchestration engine.
///
/// `submit_*` never blocks on processing: it validates, checks admission,
/// creates the task record and returns the id; a background worker drives
/// the task to a terminal state.
pub struct CompositionEngine<R: StageRunner + 'static> {
    ctx: Arc<EngineCtx<R>>,
    monitor: Arc<ResourceMonitor>,
    permits: Arc<Semaphore>,
    cancels: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl<R: StageRunner + 'static> CompositionEngine<R> {
    /// Wire the engine from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        subtitle: SubtitleConfig,
        registry: Arc<TaskRegistry>,
        runner: Arc<R>,
        synthesizer: Arc<CommandSynthesizer>,
        resolver: Arc<dyn Resolver>,
        transcriber: Option<Arc<dyn Transcriber>>,
        monitor: Arc<ResourceMonitor>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        Self {
            ctx: Arc::new(EngineCtx {
                config,
                subtitle,
                registry,
                runner,
                synthesizer,
                resolver,
                transcriber,
            }),
            monitor,
            permits,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The registry backing this engine.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.ctx.registry
    }

    /// Snapshot of one task.
    pub fn task(&self, id: &str) -> Result<Task, EngineError> {
        self.ctx
            .registry
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Snapshot of all tasks, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.ctx.registry.list()
    }

    /// Submit a composition request.
    pub fn submit_composition(&self, request: CompositionRequest) -> Result<String, EngineError> {
        validate_request(&request).map_err(|e| {
            metrics::ADMISSION_REJECTIONS
                .with_label_values(&["validation"])
                .inc();
            EngineError::Validation(e.to_string())
        })?;

        let permit = self.admit()?;
        let (task_id, cancel) = self.register(TaskKind::Composition);
        let ctx = Arc::clone(&self.ctx);
        self.spawn_worker(
            task_id.clone(),
            TaskKind::Composition,
            permit,
            ctx.run_composition(task_id.clone(), request, cancel),
        );
        Ok(task_id)
    }

    /// Submit a download request.
    pub fn submit_download(&self, request: DownloadRequest) -> Result<String, EngineError> {
        let permit = self.admit()?;
        let (task_id, cancel) = self.register(TaskKind::Download);
        let ctx = Arc::clone(&self.ctx);
        self.spawn_worker(
            task_id.clone(),
            TaskKind::Download,
            permit,
            ctx.run_download(task_id.clone(), request, cancel),
        );
        Ok(task_id)
    }

    /// Submit a transcription request.
    pub fn submit_transcription(
        &self,
        request: TranscriptionRequest,
    ) -> Result<String, EngineError> {
        if self.ctx.transcriber.is_none() {
            return Err(EngineError::TranscriberUnavailable);
        }

        let permit = self.admit()?;
        let (task_id, cancel) = self.register(TaskKind::Transcription);
        let ctx = Arc::clone(&self.ctx);
        self.spawn_worker(
            task_id.clone(),
            TaskKind::Transcription,
            permit,
            ctx.run_transcription(task_id.clone(), request, cancel),
        );
        Ok(task_id)
    }

    /// Submit a keyframe-extraction request.
    pub fn submit_keyframes(&self, request: KeyframeRequest) -> Result<String, EngineError> {
        if let Some(interval) = request.interval_secs {
            if interval <= 0.0 {
                return Err(EngineError::Validation(
                    "interval_secs must be positive".to_string(),
                ));
            }
        }

        let permit = self.admit()?;
        let (task_id, cancel) = self.register(TaskKind::KeyframeExtraction);
        let ctx = Arc::clone(&self.ctx);
        self.spawn_worker(
            task_id.clone(),
            TaskKind::KeyframeExtraction,
            permit,
            ctx.run_keyframes(task_id.clone(), request, cancel),
        );
        Ok(task_id)
    }

    /// Delete a task.
    ///
    /// A queued task never starts; a running task's process tree is
    /// terminated and the record transitions to failed/cancelled (first
    /// terminal transition wins). A terminal task's record and durable
    /// results are removed immediately.
    pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let task = self.task(id)?;

        if task.is_terminal() {
            let _ = self.ctx.registry.delete(id);
            self.remove_task_dirs(id).await;
            return Ok(());
        }

        // Terminal transition first, then signal: the worker's own failure
        // report becomes a no-op either way.
        let _ = self.ctx.registry.fail(
            id,
            TaskFailure::new(
                crate::registry::FailureKind::Cancelled,
                "task cancelled by client",
            ),
        );
        if let Some(token) = self.cancels.lock().expect("cancel map poisoned").remove(id) {
            token.cancel();
        }
        info!(task = id, "Task cancelled");
        Ok(())
    }

    /// Remove a task's workspace and results directories. Failures are
    /// logged, never escalated.
    async fn remove_task_dirs(&self, id: &str) {
        for root in [&self.ctx.config.temp_dir, &self.ctx.config.results_dir] {
            let dir = root.join(id);
            if dir.exists() {
                if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                    warn!("Failed to remove {}: {}", dir.display(), e);
                }
            }
        }
    }

    /// Admission gate: resource verdict plus the concurrency ceiling.
    fn admit(&self) -> Result<OwnedSemaphorePermit, EngineError> {
        let verdict = self.monitor.can_admit();
        if !verdict.admit {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "resources exhausted".to_string());
            let label = if reason.contains("disk") { "disk" } else { "memory" };
            metrics::ADMISSION_REJECTIONS
                .with_label_values(&[label])
                .inc();
            return Err(EngineError::ResourceExhausted { reason });
        }

        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(_) => {
                metrics::ADMISSION_REJECTIONS
                    .with_label_values(&["concurrency"])
                    .inc();
                Err(EngineError::ResourceExhausted {
                    reason: "active task count at concurrency ceiling".to_string(),
                })
            }
        }
    }

    fn register(&self, kind: TaskKind) -> (String, CancellationToken) {
        let task = self.ctx.registry.create(kind);
        let cancel = CancellationToken::new();
        self.cancels
            .lock()
            .expect("cancel map poisoned")
            .insert(task.id.clone(), cancel.clone());

        metrics::TASKS_SUBMITTED
            .with_label_values(&[kind.as_str()])
            .inc();
        metrics::TASKS_ACTIVE.set(self.ctx.registry.active_count() as i64);
        (task.id, cancel)
    }

    /// Drive a worker future to a terminal registry state, then clean up.
    fn spawn_worker<F>(
        &self,
        task_id: String,
        kind: TaskKind,
        permit: OwnedSemaphorePermit,
        worker: F,
    ) where
        F: Future<Output = Result<TaskResult, TaskFailure>> + Send + 'static,
    {
        let registry = Arc::clone(&self.ctx.registry);
        let cancels = Arc::clone(&self.cancels);
        let workspace = self.ctx.config.temp_dir.join(&task_id);
        let results_dir = self.ctx.config.results_dir.join(&task_id);
        let started = std::time::Instant::now();

        tokio::spawn(async move {
            // Held for the task's whole lifetime; releasing it frees a slot
            // at the admission ceiling.
            let _permit = permit;
            let outcome = worker.await;

            match outcome {
                Ok(result) => {
                    let applied = registry.complete(&task_id, result).unwrap_or(false);
                    if applied {
                        metrics::TASKS_COMPLETED
                            .with_label_values(&[kind.as_str()])
                            .inc();
                    } else {
                        // A cancellation won the race; its cleanup owns the
                        // partial results.
                        debug!(task = %task_id, "Completion lost the terminal race");
                        if let Err(e) = tokio::fs::remove_dir_all(&results_dir).await {
                            debug!("No results to discard: {}", e);
                        }
                    }
                }
                Err(failure) => {
                    let reason = failure.kind;
                    let applied = registry.fail(&task_id, failure).unwrap_or(false);
                    if applied {
                        metrics::TASKS_FAILED
                            .with_label_values(&[kind.as_str(), reason.as_str()])
                            .inc();
                    }
                }
            }

            // Temp artifacts are reclaimed on every terminal path; only the
            // promoted results directory survives a success.
            if workspace.exists() {
                if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
                    warn!("Failed to clean workspace {}: {}", workspace.display(), e);
                }
            }

            cancels
                .lock()
                .expect("cancel map poisoned")
                .remove(&task_id);
            metrics::TASK_DURATION
                .with_label_values(&[kind.as_str()])
                .observe(started.elapsed().as_secs_f64());
            metrics::TASKS_ACTIVE.set(registry.active_count() as i64);
        });
    }
}
