use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    /// Transcription is optional; tasks of that kind are rejected when unset.
    #[serde(default)]
    pub transcriber: Option<TranscriberConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    7878
}

/// Engine configuration: worker pool, workspaces, retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum tasks processing concurrently (admission ceiling).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Root for per-task temp workspaces.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Root for durable results, one subdirectory per task id.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// How long terminal task records (and their results) are retained.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// Janitor sweep interval.
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("mixdown-work")
}

fn default_results_dir() -> PathBuf {
    std::env::temp_dir().join("mixdown-results")
}

fn default_retention() -> u64 {
    3600 // 1 hour
}

fn default_janitor_interval() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            temp_dir: default_temp_dir(),
            results_dir: default_results_dir(),
            retention_secs: default_retention(),
            janitor_interval_secs: default_janitor_interval(),
        }
    }
}

/// Resource monitor configuration (admission thresholds, sample cadence).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Reject new tasks at or above this memory usage.
    #[serde(default = "default_max_memory_percent")]
    pub max_memory_percent: f32,

    /// Reject new tasks when free disk under the temp root drops below this.
    #[serde(default = "default_min_disk_free")]
    pub min_disk_free_bytes: u64,

    /// Sampling interval.
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
}

fn default_max_memory_percent() -> f32 {
    80.0
}

fn default_min_disk_free() -> u64 {
    // Must accommodate at least one worst-case output file.
    2 * 1024 * 1024 * 1024
}

fn default_sample_interval() -> u64 {
    5
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_memory_percent: default_max_memory_percent(),
            min_disk_free_bytes: default_min_disk_free(),
            sample_interval_secs: default_sample_interval(),
        }
    }
}

/// FFmpeg runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfmpegConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Minimum wall-clock budget for a single stage in seconds.
    #[serde(default = "default_min_stage_timeout")]
    pub min_stage_timeout_secs: u64,

    /// Stage budget multiplier applied to the source duration.
    #[serde(default = "default_timeout_factor")]
    pub timeout_per_duration_factor: f64,

    /// Number of stderr lines retained for diagnostics.
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_lines: usize,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_min_stage_timeout() -> u64 {
    300
}

fn default_timeout_factor() -> f64 {
    3.0
}

fn default_stderr_tail() -> usize {
    40
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            min_stage_timeout_secs: default_min_stage_timeout(),
            timeout_per_duration_factor: default_timeout_factor(),
            stderr_tail_lines: default_stderr_tail(),
            extra_args: Vec::new(),
        }
    }
}

/// Source resolver configuration (duration ceilings, download limits).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Maximum duration accepted for remote sources.
    #[serde(default = "default_max_remote_duration")]
    pub max_remote_duration_secs: f64,

    /// Maximum duration accepted for local files.
    #[serde(default = "default_max_local_duration")]
    pub max_local_duration_secs: f64,

    /// HTTP request timeout for downloads in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

fn default_max_remote_duration() -> f64 {
    2.0 * 3600.0
}

fn default_max_local_duration() -> f64 {
    3.0 * 3600.0
}

fn default_download_timeout() -> u64 {
    1800
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_remote_duration_secs: default_max_remote_duration(),
            max_local_duration_secs: default_max_local_duration(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

/// Subtitle conversion and burn-in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtitleConfig {
    /// Minimum duration of a generated cue in seconds.
    #[serde(default = "default_min_cue_secs")]
    pub min_cue_secs: f64,

    /// Maximum duration of a generated cue in seconds.
    #[serde(default = "default_max_cue_secs")]
    pub max_cue_secs: f64,

    /// Burn-in font size.
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Burn-in primary colour (ASS BGR hex, no prefix).
    #[serde(default = "default_font_colour")]
    pub font_colour: String,

    /// Burn-in outline colour (ASS BGR hex, no prefix).
    #[serde(default = "default_outline_colour")]
    pub outline_colour: String,
}

fn default_min_cue_secs() -> f64 {
    1.0
}

fn default_max_cue_secs() -> f64 {
    8.0
}

fn default_font_size() -> u32 {
    24
}

fn default_font_colour() -> String {
    "FFFFFF".to_string()
}

fn default_outline_colour() -> String {
    "000000".to_string()
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            min_cue_secs: default_min_cue_secs(),
            max_cue_secs: default_max_cue_secs(),
            font_size: default_font_size(),
            font_colour: default_font_colour(),
            outline_colour: default_outline_colour(),
        }
    }
}

/// Transcriber configuration (whisper CLI collaborator).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriberConfig {
    /// Path to the whisper binary.
    #[serde(default = "default_whisper_path")]
    pub binary_path: PathBuf,

    /// Model name passed to the CLI.
    #[serde(default = "default_whisper_model")]
    pub model: String,

    /// Optional forced language code (auto-detect when unset).
    #[serde(default)]
    pub language: Option<String>,

    /// Transcription timeout in seconds.
    #[serde(default = "default_transcribe_timeout")]
    pub timeout_secs: u64,
}

fn default_whisper_path() -> PathBuf {
    PathBuf::from("whisper")
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_transcribe_timeout() -> u64 {
    3600
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary_path: default_whisper_path(),
            model: default_whisper_model(),
            language: None,
            timeout_secs: default_transcribe_timeout(),
        }
    }
}

/// Sanitized config for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub resources: ResourceConfig,
    pub resolver: ResolverConfig,
    pub subtitle: SubtitleConfig,
    pub transcriber_enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            engine: config.engine.clone(),
            resources: config.resources.clone(),
            resolver: config.resolver.clone(),
            subtitle: config.subtitle.clone(),
            transcriber_enabled: config.transcriber.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 7878);
        assert_eq!(config.engine.max_concurrent_tasks, 3);
        assert_eq!(config.resources.max_memory_percent, 80.0);
        assert!(config.transcriber.is_none());
    }

    #[test]
    fn test_sanitized_config_hides_transcriber_details() {
        let mut config = Config::default();
        config.transcriber = Some(TranscriberConfig::default());
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.transcriber_enabled);
    }
}
