//! Composition request types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The six supported composition modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Sequential concatenation of all inputs.
    Concat,
    /// One main video with one or more scaled overlays.
    PictureInPicture,
    /// Inputs stacked horizontally or vertically.
    SideBySide,
    /// Inputs tiled into a rows × cols grid.
    Grid,
    /// Still images held for per-image durations, optional audio bed.
    Slideshow,
    /// Single video muxed with an audio track and optional burned subtitles.
    AudioVideoSubtitle,
}

impl CompositionMode {
    /// Returns the mode as a string (for metrics labels and logging).
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionMode::Concat => "concat",
            CompositionMode::PictureInPicture => "picture_in_picture",
            CompositionMode::SideBySide => "side_by_side",
            CompositionMode::Grid => "grid",
            CompositionMode::Slideshow => "slideshow",
            CompositionMode::AudioVideoSubtitle => "audio_video_subtitle",
        }
    }
}

/// A media source: remote URL or local file path.
///
/// Deserialized from a plain string; anything with an http(s) scheme is
/// treated as remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceRef {
    Url(String),
    Local(PathBuf),
}

impl SourceRef {
    /// Classify a raw source string.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SourceRef::Url(raw.to_string())
        } else {
            SourceRef::Local(PathBuf::from(raw))
        }
    }

    /// Returns true for URL sources.
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Url(_))
    }

    /// Display form for logging and error messages.
    pub fn describe(&self) -> String {
        match self {
            SourceRef::Url(url) => url.clone(),
            SourceRef::Local(path) => path.display().to_string(),
        }
    }
}

impl From<String> for SourceRef {
    fn from(raw: String) -> Self {
        SourceRef::parse(&raw)
    }
}

impl From<SourceRef> for String {
    fn from(source: SourceRef) -> Self {
        source.describe()
    }
}

/// Half-open trim window `[start, end)` in seconds from the source start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

/// Target position, size and opacity of an overlay or tile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlacementRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_opacity() -> f32 {
    1.0
}

/// Role of an input within picture-in-picture composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    Main,
    Overlay,
}

/// One input clip of a composition request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputClip {
    /// Source URL or local path.
    pub source: SourceRef,

    /// Role within the composition (picture_in_picture only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<InputRole>,

    /// Optional trim window applied before any other processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimWindow>,

    /// Placement rectangle (required for overlays, optional for grid tiles).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementRect>,

    /// Volume multiplier for this input's audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    /// Hold duration in seconds (slideshow stills only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_secs: Option<f64>,
}

impl InputClip {
    /// Create a clip from a raw source string with no options set.
    pub fn new(source: impl AsRef<str>) -> Self {
        Self {
            source: SourceRef::parse(source.as_ref()),
            role: None,
            trim: None,
            placement: None,
            volume: None,
            hold_secs: None,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: InputRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the placement rectangle.
    pub fn with_placement(mut self, placement: PlacementRect) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Set the trim window.
    pub fn with_trim(mut self, start: f64, end: f64) -> Self {
        self.trim = Some(TrimWindow { start, end });
        self
    }

    /// Set the hold duration (slideshow).
    pub fn with_hold(mut self, secs: f64) -> Self {
        self.hold_secs = Some(secs);
        self
    }
}

/// Auxiliary audio track for slideshow and audio_video_subtitle modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTrack {
    pub source: SourceRef,

    /// Volume multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    /// Loop the audio instead of clipping to the shorter stream (slideshow).
    #[serde(default)]
    pub loop_audio: bool,
}

/// Auxiliary subtitle track, burned into the video when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleTrack {
    pub source: SourceRef,
}

/// Spatial arrangement for side_by_side composition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

/// Explicit grid dimensions. When absent the smallest square-ish grid
/// accommodating all inputs is used.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
}

/// Target container format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
}

impl ContainerFormat {
    /// File extension for the container.
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Webm => "webm",
        }
    }
}

/// Target video codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Vp9,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
        }
    }
}

/// Target audio codec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    #[default]
    Aac,
    Opus,
}

impl AudioCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Opus => "libopus",
        }
    }
}

/// Target output specification shared by every composition mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSpec {
    #[serde(default)]
    pub container: ContainerFormat,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub video_codec: VideoCodec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub audio_codec: AudioCodec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate_kbps: Option<u32>,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> u32 {
    25
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            container: ContainerFormat::default(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            video_codec: VideoCodec::default(),
            video_bitrate_kbps: None,
            audio_codec: AudioCodec::default(),
            audio_bitrate_kbps: None,
        }
    }
}

fn default_transition() -> f64 {
    0.5
}

/// A validated request for one composition task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionRequest {
    pub mode: CompositionMode,

    /// Ordered input clips.
    pub inputs: Vec<InputClip>,

    /// Audio bed (slideshow, audio_video_subtitle).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_track: Option<AudioTrack>,

    /// Subtitles to burn in (audio_video_subtitle).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_track: Option<SubtitleTrack>,

    /// Stacking direction for side_by_side.
    #[serde(default)]
    pub layout: Layout,

    /// Explicit grid dimensions for grid mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSpec>,

    /// Transition duration between slideshow stills in seconds.
    #[serde(default = "default_transition")]
    pub transition_secs: f64,

    #[serde(default)]
    pub output: OutputSpec,
}

impl CompositionRequest {
    /// Create a request with default output and no auxiliary tracks.
    pub fn new(mode: CompositionMode, inputs: Vec<InputClip>) -> Self {
        Self {
            mode,
            inputs,
            audio_track: None,
            subtitle_track: None,
            layout: Layout::default(),
            grid: None,
            transition_secs: default_transition(),
            output: OutputSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ref_classification() {
        assert!(SourceRef::parse("https://example.com/clip.mp4").is_remote());
        assert!(SourceRef::parse("http://example.com/clip.mp4").is_remote());
        assert!(!SourceRef::parse("/data/clip.mp4").is_remote());
        assert!(!SourceRef::parse("clips/intro.mp4").is_remote());
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "mode": "picture_in_picture",
            "inputs": [
                {"source": "https://example.com/main.mp4", "role": "main"},
                {
                    "source": "/data/overlay.mp4",
                    "role": "overlay",
                    "placement": {"x": 50, "y": 50, "width": 320, "height": 240},
                    "volume": 0.0
                }
            ],
            "output": {"width": 1280, "height": 720}
        }"#;

        let request: CompositionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.mode, CompositionMode::PictureInPicture);
        assert_eq!(request.inputs.len(), 2);
        assert_eq!(request.inputs[0].role, Some(InputRole::Main));
        let placement = request.inputs[1].placement.unwrap();
        assert_eq!(placement.width, 320);
        // Opacity defaults to fully opaque when omitted.
        assert_eq!(placement.opacity, 1.0);
    }

    #[test]
    fn test_output_spec_defaults() {
        let spec = OutputSpec::default();
        assert_eq!(spec.width, 1280);
        assert_eq!(spec.height, 720);
        assert_eq!(spec.fps, 25);
        assert_eq!(spec.container.extension(), "mp4");
        assert_eq!(spec.video_codec.ffmpeg_name(), "libx264");
    }

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&CompositionMode::AudioVideoSubtitle).unwrap();
        assert_eq!(json, "\"audio_video_subtitle\"");
    }

    #[test]
    fn test_source_ref_round_trip() {
        let clip = InputClip::new("https://example.com/a.mp4");
        let json = serde_json::to_string(&clip).unwrap();
        let back: InputClip = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source, clip.source);
    }
}
