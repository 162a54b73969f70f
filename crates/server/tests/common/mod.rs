//! Common test utilities for API testing with mocks.
//!
//! Provides an in-process router with mock collaborators injected, enabling
//! end-to-end API testing without FFmpeg, network access or a speech model.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mixdown_core::{
    testing::{MockResolver, MockStageRunner, MockTranscriber},
    CommandSynthesizer, CompositionEngine, Config, Janitor, ResourceMonitor, SubtitleConfig,
    TaskRegistry, TranscriberConfig,
};
use mixdown_server::{create_router, AppState};

/// Test fixture: in-process server with mock collaborators.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock stage runner - control stage outcomes
    pub runner: MockStageRunner,
    /// Mock resolver - control source resolution
    pub resolver: MockResolver,
    /// Temp workspace root (kept alive for the fixture's lifetime)
    pub temp_dir: TempDir,
    /// Durable results root
    pub results_dir: TempDir,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_options(3, true).await
    }

    pub async fn with_options(max_concurrent: usize, with_transcriber: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let results_dir = TempDir::new().expect("Failed to create results dir");

        let mut config = Config::default();
        config.engine.temp_dir = temp_dir.path().to_path_buf();
        config.engine.results_dir = results_dir.path().to_path_buf();
        config.engine.max_concurrent_tasks = max_concurrent;
        config.transcriber = with_transcriber.then(TranscriberConfig::default);

        let registry = Arc::new(TaskRegistry::new());
        let runner = MockStageRunner::new();
        let resolver = MockResolver::new();
        let monitor = Arc::new(ResourceMonitor::new(
            config.resources.clone(),
            config.engine.temp_dir.clone(),
        ));
        let janitor = Arc::new(Janitor::new(Arc::clone(&registry), &config.engine));

        let transcriber = with_transcriber
            .then(|| Arc::new(MockTranscriber::new()) as Arc<dyn mixdown_core::Transcriber>);

        let engine = Arc::new(CompositionEngine::new(
            config.engine.clone(),
            SubtitleConfig::default(),
            registry,
            Arc::new(runner.clone()),
            Arc::new(CommandSynthesizer::with_defaults()),
            Arc::new(resolver.clone()),
            transcriber,
            Arc::clone(&monitor),
        ));

        let state = Arc::new(AppState::new(config, engine, monitor, janitor));
        let router = create_router(state);

        Self {
            router,
            runner,
            resolver,
            temp_dir,
            results_dir,
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        Self::split(response).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        Self::split(response).await
    }

    pub async fn delete(&self, path: &str) -> StatusCode {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        response.status()
    }

    /// Raw GET for binary endpoints.
    pub async fn get_bytes(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, bytes.to_vec())
    }

    /// Poll a task until it reaches a terminal status.
    pub async fn wait_terminal(&self, task_id: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = self.get(&format!("/api/v1/tasks/{}", task_id)).await;
            assert_eq!(status, StatusCode::OK);
            let task_status = body["status"].as_str().unwrap_or_default().to_string();
            if task_status == "completed" || task_status == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not reach a terminal state", task_id);
    }

    async fn split(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
