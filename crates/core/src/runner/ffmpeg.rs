//! FFmpeg-based stage runner implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use crate::config::FfmpegConfig;
use crate::synth::PipelineStage;

use super::error::RunnerError;
use super::traits::{ProgressFn, StageRunner};
use super::types::{MediaInfo, StageOutcome};

/// FFmpeg-based stage runner.
pub struct FfmpegRunner {
    config: FfmpegConfig,
}

enum Ended {
    Finished(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl FfmpegRunner {
    /// Creates a new runner with the given configuration.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Creates a runner with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default())
    }

    /// Wall-clock budget for a stage: an explicit override wins, otherwise
    /// `max(min_stage_timeout, factor × source duration)`.
    fn stage_budget_secs(&self, stage: &PipelineStage) -> u64 {
        if let Some(secs) = stage.timeout_secs {
            return secs;
        }

        let by_duration = stage
            .source_duration_secs
            .map(|d| (d * self.config.timeout_per_duration_factor).ceil() as u64)
            .unwrap_or(0);
        by_duration.max(self.config.min_stage_timeout_secs)
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, RunnerError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| RunnerError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            video_width: video_stream.and_then(|s| s.width),
            video_height: video_stream.and_then(|s| s.height),
            video_fps: video_stream
                .and_then(|s| s.r_frame_rate.as_ref())
                .and_then(|r| {
                    // Frame rates arrive as ratios like "24000/1001" or "30/1".
                    let parts: Vec<&str> = r.split('/').collect();
                    if parts.len() == 2 {
                        let num = parts[0].parse::<f32>().ok()?;
                        let den = parts[1].parse::<f32>().ok()?;
                        if den > 0.0 {
                            Some(num / den)
                        } else {
                            None
                        }
                    } else {
                        r.parse::<f32>().ok()
                    }
                }),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
        })
    }
}

#[async_trait]
impl StageRunner for FfmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, RunnerError> {
        if !path.exists() {
            return Err(RunnerError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunnerError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    RunnerError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(RunnerError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn run(
        &self,
        stage: &PipelineStage,
        on_progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome, RunnerError> {
        let start = Instant::now();
        let budget_secs = self.stage_budget_secs(stage);

        let mut command = Command::new(&self.config.ffmpeg_path);
        command
            .args(&stage.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &stage.workdir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                }
            } else {
                RunnerError::Io(e)
            }
        })?;

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut reader = BufReader::new(stderr).lines();

        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let tail_cap = self.config.stderr_tail_lines.max(1);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(tail_cap);
        let total_duration = stage.source_duration_secs.filter(|d| *d > 0.0);
        let mut last_percent = 0u8;

        let ended = {
            let drive = async {
                while let Ok(Some(line)) = reader.next_line().await {
                    if tail.len() == tail_cap {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());

                    if let (Some(re), Some(total)) = (&time_regex, total_duration) {
                        if let Some(us) = re
                            .captures(&line)
                            .and_then(|caps| caps.get(1))
                            .and_then(|m| m.as_str().parse::<f64>().ok())
                        {
                            // out_time_ms is microseconds despite the name.
                            let processed = us / 1_000_000.0;
                            let percent = ((processed / total) * 100.0).clamp(0.0, 100.0) as u8;
                            if percent > last_percent {
                                last_percent = percent;
                                on_progress(percent);
                            }
                        }
                    }
                }
                child.wait().await
            };
            tokio::pin!(drive);

            tokio::select! {
                res = timeout(Duration::from_secs(budget_secs), &mut drive) => match res {
                    Ok(status) => Ended::Finished(status),
                    Err(_) => Ended::TimedOut,
                },
                _ = cancel.cancelled() => Ended::Cancelled,
            }
        };

        match ended {
            Ended::Finished(Ok(status)) => {
                if status.success() {
                    Ok(StageOutcome {
                        exit_code: status.code().unwrap_or(0),
                        duration_ms: start.elapsed().as_millis() as u64,
                        stderr_tail: tail.into_iter().collect(),
                    })
                } else {
                    Err(RunnerError::StageFailed {
                        stage: stage.name.clone(),
                        code: status.code(),
                        stderr_tail: tail.iter().cloned().collect::<Vec<_>>().join("\n"),
                    })
                }
            }
            Ended::Finished(Err(e)) => Err(RunnerError::Io(e)),
            Ended::TimedOut => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(RunnerError::Timeout {
                    stage: stage.name.clone(),
                    budget_secs,
                })
            }
            Ended::Cancelled => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(RunnerError::Cancelled {
                    stage: stage.name.clone(),
                })
            }
        }
    }

    async fn validate(&self) -> Result<(), RunnerError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(RunnerError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(RunnerError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(RunnerError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(RunnerError::Io(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh_runner() -> FfmpegRunner {
        // A shell stands in for ffmpeg so supervision can be tested without
        // the real binary.
        let mut config = FfmpegConfig::default();
        config.ffmpeg_path = PathBuf::from("/bin/sh");
        FfmpegRunner::new(config)
    }

    fn sh_stage(script: &str) -> PipelineStage {
        PipelineStage::new(
            "synthetic",
            vec!["-c".to_string(), script.to_string()],
            PathBuf::from("/dev/null"),
        )
    }

    #[test]
    fn test_stage_budget_override_wins() {
        let runner = FfmpegRunner::with_defaults();
        let stage = sh_stage("true").with_duration(10_000.0).with_timeout(7);
        assert_eq!(runner.stage_budget_secs(&stage), 7);
    }

    #[test]
    fn test_stage_budget_floor() {
        let runner = FfmpegRunner::with_defaults();
        // 3 × 10s is far below the 300s floor.
        let stage = sh_stage("true").with_duration(10.0);
        assert_eq!(runner.stage_budget_secs(&stage), 300);
    }

    #[test]
    fn test_stage_budget_scales_with_duration() {
        let runner = FfmpegRunner::with_defaults();
        let stage = sh_stage("true").with_duration(200.0);
        assert_eq!(runner.stage_budget_secs(&stage), 600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success() {
        let runner = sh_runner();
        let stage = sh_stage("exit 0");
        let cancel = CancellationToken::new();

        let outcome = runner.run(&stage, &|_| {}, &cancel).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_captures_stderr_tail() {
        let runner = sh_runner();
        let stage = sh_stage("echo boom >&2; exit 3");
        let cancel = CancellationToken::new();

        let err = runner.run(&stage, &|_| {}, &cancel).await.unwrap_err();
        match err {
            RunnerError::StageFailed {
                code, stderr_tail, ..
            } => {
                assert_eq!(code, Some(3));
                assert!(stderr_tail.contains("boom"));
            }
            other => panic!("expected StageFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout_kills_sleeper() {
        let runner = sh_runner();
        let stage = sh_stage("sleep 5").with_timeout(1);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let err = runner.run(&stage, &|_| {}, &cancel).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { budget_secs: 1, .. }));
        // The sleeper must not run to completion.
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cancellation() {
        let runner = sh_runner();
        let stage = sh_stage("sleep 5");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = runner.run(&stage, &|_| {}, &cancel).await.unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "30.5",
                "size": "1048576"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "24000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2
                }
            ]
        }"#;

        let info = FfmpegRunner::parse_probe_output(Path::new("test.mp4"), json).unwrap();
        assert_eq!(info.format, "mov");
        assert!((info.duration_secs - 30.5).abs() < 0.01);
        assert_eq!(info.size_bytes, 1_048_576);
        assert_eq!(info.video_codec, Some("h264".to_string()));
        assert_eq!(info.video_width, Some(1920));
        // 24000/1001 ≈ 23.976
        let fps = info.video_fps.unwrap();
        assert!((fps - 23.976).abs() < 0.01);
        assert_eq!(info.audio_channels, Some(2));
    }

    #[test]
    fn test_parse_probe_output_audio_only() {
        let json = r#"{
            "format": {
                "format_name": "wav",
                "duration": "20.0",
                "size": "640000"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "pcm_s16le",
                    "sample_rate": "16000",
                    "channels": 1
                }
            ]
        }"#;

        let info = FfmpegRunner::parse_probe_output(Path::new("audio.wav"), json).unwrap();
        assert!(!info.has_video());
        assert!(info.has_audio());
        assert_eq!(info.audio_sample_rate, Some(16000));
    }
}
