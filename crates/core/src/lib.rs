//! mixdown-core: asynchronous media composition and task orchestration.
//!
//! Long-running media operations (composition, transcription, download,
//! keyframe extraction) run as tasks driven by the [`engine::CompositionEngine`]:
//! admission-controlled, progress-tracked and reclaimed by the
//! [`registry::Janitor`] after their retention window.

pub mod compose;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod resources;
pub mod runner;
pub mod subtitle;
pub mod synth;
pub mod testing;
pub mod transcribe;

pub use compose::{
    validate_request, AudioTrack, CompositionMode, CompositionRequest, InputClip, InputRole,
    OutputSpec, RequestError, SourceRef, SubtitleTrack,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineConfig,
    FfmpegConfig, ResolverConfig, ResourceConfig, SanitizedConfig, SubtitleConfig,
    TranscriberConfig,
};
pub use engine::{
    CompositionEngine, DownloadRequest, EngineError, KeyframeRequest, TranscriptionRequest,
};
pub use registry::{
    FailureKind, Janitor, SweepStats, Task, TaskFailure, TaskKind, TaskRegistry, TaskResult,
    TaskStatus,
};
pub use resolver::{MediaResolver, ResolveError, ResolvedSource, Resolver};
pub use resources::{AdmissionVerdict, ResourceMonitor, ResourceSample};
pub use runner::{FfmpegRunner, MediaInfo, RunnerError, StageRunner};
pub use synth::{CommandSynthesizer, PipelineStage, ResolvedInput, SynthError};
pub use transcribe::{TranscribeError, Transcriber, Transcript, WhisperCliTranscriber};
