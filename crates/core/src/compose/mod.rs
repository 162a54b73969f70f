//! Composition request model and boundary validation.
//!
//! Requests arrive as tagged JSON, are validated exhaustively here, and only
//! then enter the engine. Validation failures never create a task record.

mod types;
mod validate;

pub use types::{
    AudioCodec, AudioTrack, CompositionMode, CompositionRequest, ContainerFormat, GridSpec,
    InputClip, InputRole, Layout, OutputSpec, PlacementRect, SourceRef, SubtitleTrack, TrimWindow,
    VideoCodec,
};
pub use validate::{validate_request, RequestError};
