//! Source resolution: URL or local path → probed local file.
//!
//! The resolver is a narrow collaborator seam; the engine only sees
//! `resolve()` and the `SourceUnavailable` / `SourceTooLong` split.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::compose::SourceRef;
use crate::config::ResolverConfig;
use crate::runner::{MediaInfo, StageRunner};

/// Errors from source resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The source could not be fetched or read.
    #[error("source unavailable ({source_desc}): {reason}")]
    SourceUnavailable { source_desc: String, reason: String },

    /// The source's duration exceeds the configured ceiling.
    #[error("source too long: {duration_secs:.0}s exceeds ceiling {max_secs:.0}s")]
    SourceTooLong { duration_secs: f64, max_secs: f64 },

    /// I/O error while materializing the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    fn unavailable(source: &SourceRef, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_desc: source.describe(),
            reason: reason.into(),
        }
    }
}

/// A resolved source: local file plus probed metadata.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub path: PathBuf,
    pub info: MediaInfo,
    pub title: Option<String>,
}

/// Resolves a source reference to a local file inside the task workspace.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        source: &SourceRef,
        workspace: &Path,
    ) -> Result<ResolvedSource, ResolveError>;
}

/// Default resolver: local paths are probed in place, URLs are streamed into
/// the workspace first. Duration ceilings differ per origin.
pub struct MediaResolver<R: StageRunner> {
    runner: Arc<R>,
    client: reqwest::Client,
    config: ResolverConfig,
}

impl<R: StageRunner> MediaResolver<R> {
    /// Create a resolver backed by the given runner's probe.
    pub fn new(runner: Arc<R>, config: ResolverConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            runner,
            client,
            config,
        }
    }

    async fn resolve_local(&self, source: &SourceRef, path: &Path) -> Result<ResolvedSource, ResolveError> {
        if !path.exists() {
            return Err(ResolveError::unavailable(source, "file does not exist"));
        }

        let info = self
            .runner
            .probe(path)
            .await
            .map_err(|e| ResolveError::unavailable(source, e.to_string()))?;

        enforce_ceiling(&info, self.config.max_local_duration_secs)?;

        Ok(ResolvedSource {
            path: path.to_path_buf(),
            info,
            title: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string()),
        })
    }

    async fn resolve_url(
        &self,
        source: &SourceRef,
        url: &str,
        workspace: &Path,
    ) -> Result<ResolvedSource, ResolveError> {
        info!("Downloading source {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::unavailable(source, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResolveError::unavailable(
                source,
                format!("HTTP status {}", response.status()),
            ));
        }

        let file_name = download_file_name(url);
        let target = workspace.join(&file_name);
        let mut file = tokio::fs::File::create(&target).await?;

        let mut stream = response.bytes_stream();
        let mut total_bytes: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ResolveError::unavailable(source, e.to_string()))?;
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!("Downloaded {} bytes to {}", total_bytes, target.display());

        let info = self
            .runner
            .probe(&target)
            .await
            .map_err(|e| ResolveError::unavailable(source, e.to_string()))?;

        enforce_ceiling(&info, self.config.max_remote_duration_secs)?;

        Ok(ResolvedSource {
            path: target,
            info,
            title: title_from_url(url),
        })
    }
}

#[async_trait]
impl<R: StageRunner> Resolver for MediaResolver<R> {
    async fn resolve(
        &self,
        source: &SourceRef,
        workspace: &Path,
    ) -> Result<ResolvedSource, ResolveError> {
        match source {
            SourceRef::Local(path) => self.resolve_local(source, path).await,
            SourceRef::Url(url) => self.resolve_url(source, url, workspace).await,
        }
    }
}

fn enforce_ceiling(info: &MediaInfo, max_secs: f64) -> Result<(), ResolveError> {
    if info.duration_secs > max_secs {
        return Err(ResolveError::SourceTooLong {
            duration_secs: info.duration_secs,
            max_secs,
        });
    }
    Ok(())
}

/// Unique workspace file name for a download, keeping the URL's extension
/// when it has one.
fn download_file_name(url: &str) -> String {
    let extension = url
        .split('?')
        .next()
        .and_then(|path| path.rsplit('.').next())
        .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("src_{}.{}", Uuid::new_v4(), ext),
        None => format!("src_{}", Uuid::new_v4()),
    }
}

fn title_from_url(url: &str) -> Option<String> {
    url.split('?')
        .next()?
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}
