//! Engine lifecycle integration tests.
//!
//! These tests drive the composition engine with mock collaborators:
//! - Admission control (concurrency ceiling, validation rejections)
//! - Task state transitions and progress monotonicity
//! - Failure, timeout and cancellation paths with workspace cleanup
//! - Result/error exclusivity

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use mixdown_core::{
    testing::{MockResolveFailure, MockResolver, MockStageRunner, MockTranscriber},
    CommandSynthesizer, CompositionEngine, CompositionMode, CompositionRequest, DownloadRequest,
    EngineConfig, EngineError, FailureKind, InputClip, KeyframeRequest, ResourceConfig,
    ResourceMonitor, SubtitleConfig, Task, TaskKind, TaskRegistry, TaskResult, TaskStatus,
    TranscriptionRequest,
};

/// Test helper wiring the engine with mock collaborators.
struct TestHarness {
    engine: CompositionEngine<MockStageRunner>,
    runner: MockStageRunner,
    resolver: MockResolver,
    registry: Arc<TaskRegistry>,
    temp_dir: TempDir,
    results_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_concurrency(3).await
    }

    async fn with_concurrency(max_concurrent: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let results_dir = TempDir::new().expect("Failed to create results dir");

        let mut config = EngineConfig::default();
        config.temp_dir = temp_dir.path().to_path_buf();
        config.results_dir = results_dir.path().to_path_buf();
        config.max_concurrent_tasks = max_concurrent;

        let registry = Arc::new(TaskRegistry::new());
        let runner = MockStageRunner::new();
        let resolver = MockResolver::new();
        let transcriber = MockTranscriber::new();
        let monitor = Arc::new(ResourceMonitor::new(
            ResourceConfig::default(),
            config.temp_dir.clone(),
        ));

        let engine = CompositionEngine::new(
            config,
            SubtitleConfig::default(),
            Arc::clone(&registry),
            Arc::new(runner.clone()),
            Arc::new(CommandSynthesizer::with_defaults()),
            Arc::new(resolver.clone()),
            Some(Arc::new(transcriber)),
            monitor,
        );

        Self {
            engine,
            runner,
            resolver,
            registry,
            temp_dir,
            results_dir,
        }
    }

    fn concat_request(&self) -> CompositionRequest {
        CompositionRequest::new(
            CompositionMode::Concat,
            vec![InputClip::new("/media/a.mp4"), InputClip::new("/media/b.mp4")],
        )
    }

    async fn wait_terminal(&self, id: &str) -> Task {
        for _ in 0..500 {
            if let Some(task) = self.registry.get(id) {
                if task.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not reach a terminal state", id);
    }

    /// Wait for the worker's post-terminal cleanup to land.
    async fn wait_workspace_removed(&self, id: &str) {
        let workspace = self.temp_dir.path().join(id);
        for _ in 0..500 {
            if !workspace.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("workspace for task {} was not cleaned up", id);
    }
}

#[tokio::test]
async fn test_concat_completes_with_result() {
    let harness = TestHarness::new().await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert!(task.error.is_none());

    match task.result.expect("completed task carries a result") {
        TaskResult::Composition {
            output_file,
            file_size_bytes,
            stage_timings,
            ..
        } => {
            assert!(output_file.exists());
            assert!(output_file.starts_with(harness.results_dir.path()));
            assert!(file_size_bytes > 0);
            // Two normalizations plus the combine stage.
            assert_eq!(stage_timings.len(), 3);
        }
        other => panic!("expected composition result, got {:?}", other),
    }

    // Metadata record sits next to the durable output.
    assert!(harness
        .results_dir
        .path()
        .join(&id)
        .join("metadata.json")
        .exists());

    harness.wait_workspace_removed(&id).await;
    assert_eq!(harness.runner.executed_count().await, 3);
}

#[tokio::test]
async fn test_validation_error_creates_no_task() {
    let harness = TestHarness::new().await;
    let request = CompositionRequest::new(CompositionMode::Concat, vec![]);

    let err = harness.engine.submit_composition(request).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(harness.engine.tasks().is_empty());
}

#[tokio::test]
async fn test_admission_ceiling_rejects_then_admits() {
    let harness = TestHarness::with_concurrency(1).await;
    harness
        .runner
        .set_stage_delay(Duration::from_millis(300))
        .await;

    let first = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();

    // The single slot is taken; the next submission is rejected without a
    // task record.
    let err = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap_err();
    assert!(matches!(err, EngineError::ResourceExhausted { .. }));
    assert_eq!(harness.engine.tasks().len(), 1);

    let done = harness.wait_terminal(&first).await;
    assert_eq!(done.status, TaskStatus::Completed);

    // The permit is released by the worker shortly after the terminal
    // transition; the next submission then goes through.
    let second = {
        let mut attempt = None;
        for _ in 0..100 {
            match harness.engine.submit_composition(harness.concat_request()) {
                Ok(id) => {
                    attempt = Some(id);
                    break;
                }
                Err(EngineError::ResourceExhausted { .. }) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(other) => panic!("unexpected submit error: {}", other),
            }
        }
        attempt.expect("slot never freed after completion")
    };
    let done = harness.wait_terminal(&second).await;
    assert_eq!(done.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_reaches_100() {
    let harness = TestHarness::new().await;
    harness
        .runner
        .set_stage_delay(Duration::from_millis(100))
        .await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();

    let mut observed = Vec::new();
    loop {
        let task = harness.registry.get(&id).expect("task exists");
        observed.push(task.progress);
        if task.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for pair in observed.windows(2) {
        assert!(pair[1] >= pair[0], "progress regressed: {:?}", observed);
    }
    assert_eq!(*observed.last().unwrap(), 100);
}

#[tokio::test]
async fn test_stage_failure_aborts_and_cleans_up() {
    let harness = TestHarness::new().await;
    harness.runner.fail_stage_named("combine segments").await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result.is_none());
    let error = task.error.expect("failed task carries an error");
    assert_eq!(error.kind, FailureKind::ProcessFailure);
    assert_eq!(error.stderr_tail.as_deref(), Some("mock failure"));
    assert_ne!(task.progress, 100);

    harness.wait_workspace_removed(&id).await;
    // The combine stage failed; nothing was promoted.
    assert!(!harness.results_dir.path().join(&id).exists());
}

#[tokio::test]
async fn test_timeout_ends_failed_never_completed() {
    let harness = TestHarness::new().await;
    harness.runner.timeout_stage_named("combine segments").await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, FailureKind::Timeout);
    assert!(task.result.is_none());
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let harness = TestHarness::new().await;
    harness
        .runner
        .set_stage_delay(Duration::from_millis(500))
        .await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    // Let the worker get into its first stage.
    tokio::time::sleep(Duration::from_millis(50)).await;

    harness.engine.delete(&id).await.unwrap();

    let task = harness.wait_terminal(&id).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, FailureKind::Cancelled);
    assert!(task.result.is_none());

    // No file remains under the task's temp workspace.
    harness.wait_workspace_removed(&id).await;
}

#[tokio::test]
async fn test_delete_terminal_task_removes_record_and_results() {
    let harness = TestHarness::new().await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    harness.wait_terminal(&id).await;
    assert!(harness.results_dir.path().join(&id).exists());

    harness.engine.delete(&id).await.unwrap();
    assert!(matches!(
        harness.engine.task(&id),
        Err(EngineError::NotFound(_))
    ));
    assert!(!harness.results_dir.path().join(&id).exists());
}

#[tokio::test]
async fn test_delete_unknown_task() {
    let harness = TestHarness::new().await;
    assert!(matches!(
        harness.engine.delete("missing").await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_source_unavailable_fails_task() {
    let harness = TestHarness::new().await;
    harness
        .resolver
        .set_failure("/media/a.mp4", MockResolveFailure::Unavailable)
        .await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, FailureKind::SourceUnavailable);
}

#[tokio::test]
async fn test_source_too_long_fails_task() {
    let harness = TestHarness::new().await;
    harness
        .resolver
        .set_failure("/media/b.mp4", MockResolveFailure::TooLong)
        .await;

    let id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.error.unwrap().kind, FailureKind::SourceTooLong);
}

#[tokio::test]
async fn test_download_task() {
    let harness = TestHarness::new().await;

    let id = harness
        .engine
        .submit_download(DownloadRequest {
            source: mixdown_core::SourceRef::parse("https://example.com/clip.mp4"),
        })
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.kind, TaskKind::Download);
    assert_eq!(task.status, TaskStatus::Completed);
    match task.result.unwrap() {
        TaskResult::Download {
            output_file,
            file_size_bytes,
            ..
        } => {
            assert!(output_file.exists());
            assert!(file_size_bytes > 0);
        }
        other => panic!("expected download result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transcription_task() {
    let harness = TestHarness::new().await;

    let id = harness
        .engine
        .submit_transcription(TranscriptionRequest {
            source: mixdown_core::SourceRef::parse("/media/talk.mp4"),
        })
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    match task.result.unwrap() {
        TaskResult::Transcription {
            text,
            cue_count,
            srt_file,
            language,
        } => {
            assert_eq!(text, "Hello world. This is a test.");
            assert_eq!(cue_count, 2);
            assert_eq!(language.as_deref(), Some("en"));
            let srt = std::fs::read_to_string(srt_file).unwrap();
            assert!(srt.contains("Hello world."));
            assert!(srt.contains("-->"));
        }
        other => panic!("expected transcription result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_keyframes_task() {
    let harness = TestHarness::new().await;

    let id = harness
        .engine
        .submit_keyframes(KeyframeRequest {
            source: mixdown_core::SourceRef::parse("/media/clip.mp4"),
            interval_secs: Some(2.0),
        })
        .unwrap();
    let task = harness.wait_terminal(&id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    match task.result.unwrap() {
        TaskResult::Keyframes { frames, directory } => {
            assert!(!frames.is_empty());
            assert!(directory.exists());
            for frame in &frames {
                assert!(frame.exists());
            }
        }
        other => panic!("expected keyframes result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_keyframes_interval_validation() {
    let harness = TestHarness::new().await;
    let err = harness
        .engine
        .submit_keyframes(KeyframeRequest {
            source: mixdown_core::SourceRef::parse("/media/clip.mp4"),
            interval_secs: Some(-1.0),
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn test_result_and_error_never_coexist() {
    let harness = TestHarness::new().await;
    harness.runner.fail_stage_named("normalize input 2").await;

    let ok_id = harness
        .engine
        .submit_download(DownloadRequest {
            source: mixdown_core::SourceRef::parse("/media/fine.mp4"),
        })
        .unwrap();
    let bad_id = harness
        .engine
        .submit_composition(harness.concat_request())
        .unwrap();

    for id in [ok_id, bad_id] {
        let task = harness.wait_terminal(&id).await;
        assert!(
            task.result.is_some() != task.error.is_some(),
            "result/error exclusivity violated for {:?}",
            task
        );
    }
}
