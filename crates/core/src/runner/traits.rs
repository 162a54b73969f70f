//! Trait definition for stage runners.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::synth::PipelineStage;

use super::error::RunnerError;
use super::types::{MediaInfo, StageOutcome};

/// Callback invoked with the stage's completion percentage (0–100).
/// Implementations guarantee monotonically non-decreasing values.
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Supervises one external media-processing invocation at a time.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Probes a media file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, RunnerError>;

    /// Runs one pipeline stage to completion.
    ///
    /// Terminates the child process when the wall-clock budget is exceeded or
    /// the cancellation token fires; either way no process outlives the call.
    async fn run(
        &self,
        stage: &PipelineStage,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome, RunnerError>;

    /// Validates that the runner's external tooling is available.
    async fn validate(&self) -> Result<(), RunnerError>;
}
