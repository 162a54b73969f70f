//! Mock resolver for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::compose::SourceRef;
use crate::resolver::{ResolveError, ResolvedSource, Resolver};
use crate::runner::MediaInfo;

/// Failure a mock resolution should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockResolveFailure {
    Unavailable,
    TooLong,
}

/// Mock implementation of the Resolver trait.
///
/// Resolves every source to a freshly written file in the workspace with
/// synthetic metadata derived from the source's extension (images probe with
/// zero duration, audio extensions without video). Individual sources can be
/// forced to fail.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    durations: Arc<RwLock<HashMap<String, f64>>>,
    failures: Arc<RwLock<HashMap<String, MockResolveFailure>>>,
    resolved: Arc<RwLock<Vec<String>>>,
}

impl MockResolver {
    /// Create a new mock resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a duration for a specific source.
    pub async fn set_duration(&self, source: impl AsRef<str>, secs: f64) {
        self.durations
            .write()
            .await
            .insert(source.as_ref().to_string(), secs);
    }

    /// Force a failure for a specific source.
    pub async fn set_failure(&self, source: impl AsRef<str>, failure: MockResolveFailure) {
        self.failures
            .write()
            .await
            .insert(source.as_ref().to_string(), failure);
    }

    /// Sources resolved so far.
    pub async fn resolved_sources(&self) -> Vec<String> {
        self.resolved.read().await.clone()
    }

    fn info_for(path: &Path, duration: f64) -> MediaInfo {
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
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(
        &self,
        source: &SourceRef,
        workspace: &Path,
    ) -> Result<ResolvedSource, ResolveError> {
        let key = source.describe();
        self.resolved.write().await.push(key.clone());

        if let Some(failure) = self.failures.read().await.get(&key) {
            return match failure {
                MockResolveFailure::Unavailable => Err(ResolveError::SourceUnavailable {
                    source_desc: key,
                    reason: "mock unavailable".to_string(),
                }),
                MockResolveFailure::TooLong => Err(ResolveError::SourceTooLong {
                    duration_secs: 10.0 * 3600.0,
                    max_secs: 2.0 * 3600.0,
                }),
            };
        }

        let duration = self
            .durations
            .read()
            .await
            .get(&key)
            .copied()
            .unwrap_or(30.0);

        // Keep the source's extension so synthesis sees the right media kind.
        let extension = key.rsplit('.').next().filter(|e| e.len() <= 4);
        let file_name = match extension {
            Some(ext) => format!("src_{}.{}", Uuid::new_v4(), ext),
            None => format!("src_{}", Uuid::new_v4()),
        };
        let path: PathBuf = workspace.join(file_name);
        tokio::fs::create_dir_all(workspace).await?;
        tokio::fs::write(&path, b"mock media").await?;

        Ok(ResolvedSource {
            info: Self::info_for(&path, duration),
            title: Some(key),
            path,
        })
    }
}
