//! The composition and task orchestration engine.

#[allow(clippy::module_inception)]
mod engine;
mod error;
mod requests;
mod worker;

pub use engine::CompositionEngine;
pub use error::EngineError;
pub use requests::{DownloadRequest, KeyframeRequest, TranscriptionRequest};
