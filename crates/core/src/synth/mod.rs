//! Command synthesis: composition request → ordered FFmpeg pipeline.
//!
//! Pure and deterministic for a given request; all file I/O (manifests, cue
//! files, the stages themselves) happens in the engine and runner.

mod filter;
mod stage;
mod synthesizer;

pub use filter::{exact_scale_filter, fit_filter, FilterGraph};
pub use stage::{ConcatManifest, CueFile, PipelineStage};
pub use synthesizer::{CommandSynthesizer, ResolvedInput, SynthError};
