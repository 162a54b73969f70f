//! Pipeline synthesis for each composition mode.
//!
//! `CommandSynthesizer` is a pure function from a validated request plus
//! resolved input metadata to an ordered stage list. It performs no I/O;
//! manifest and cue files it declares are materialized by the engine.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::compose::{
    AudioTrack, CompositionMode, CompositionRequest, InputClip, InputRole, Layout, OutputSpec,
};
use crate::config::{FfmpegConfig, SubtitleConfig};
use crate::runner::MediaInfo;
use crate::subtitle::{burn_in_style, Cue};

use super::filter::{exact_scale_filter, fit_filter, FilterGraph};
use super::stage::{ConcatManifest, CueFile, PipelineStage};

/// Hold duration for slideshow stills that carry no explicit `hold_secs`.
const DEFAULT_HOLD_SECS: f64 = 5.0;

/// An input with its resolved local path and probed metadata.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub info: MediaInfo,
}

/// Errors from pipeline synthesis. These reflect invalid resolved media, not
/// invalid request structure (the boundary validator owns that).
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("input {index} has zero duration")]
    ZeroDurationInput { index: usize },

    #[error("audio track has zero duration")]
    ZeroDurationAudio,

    #[error("input {index} has no video stream")]
    MissingVideoStream { index: usize },

    #[error("request has {inputs} inputs but {resolved} resolved entries")]
    InputMismatch { inputs: usize, resolved: usize },
}

/// Synthesizes FFmpeg pipelines for composition requests.
pub struct CommandSynthesizer {
    ffmpeg: FfmpegConfig,
    subtitle: SubtitleConfig,
}

impl CommandSynthesizer {
    /// Creates a synthesizer from runner and subtitle configuration.
    pub fn new(ffmpeg: FfmpegConfig, subtitle: SubtitleConfig) -> Self {
        Self { ffmpeg, subtitle }
    }

    /// Creates a synthesizer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegConfig::default(), SubtitleConfig::default())
    }

    /// Produce the ordered stage list for a composition request.
    ///
    /// `inputs` is parallel to `request.inputs`; `audio` is the resolved
    /// `audio_track`; `cues` is the normalized subtitle cue list.
    pub fn synthesize(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        audio: Option<&ResolvedInput>,
        cues: Option<&[Cue]>,
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        if inputs.len() != request.inputs.len() {
            return Err(SynthError::InputMismatch {
                inputs: request.inputs.len(),
                resolved: inputs.len(),
            });
        }

        for (index, resolved) in inputs.iter().enumerate() {
            if !resolved.info.has_video() {
                return Err(SynthError::MissingVideoStream { index });
            }
            // Still images probe without a duration; every other mode needs one.
            if request.mode != CompositionMode::Slideshow && resolved.info.duration_secs <= 0.0 {
                return Err(SynthError::ZeroDurationInput { index });
            }
        }

        if let Some(audio) = audio {
            if audio.info.duration_secs <= 0.0 {
                return Err(SynthError::ZeroDurationAudio);
            }
        }

        match request.mode {
            CompositionMode::Concat => self.concat_stages(request, inputs, workspace),
            CompositionMode::PictureInPicture => self.pip_stages(request, inputs, workspace),
            CompositionMode::SideBySide => self.side_by_side_stages(request, inputs, workspace),
            CompositionMode::Grid => self.grid_stages(request, inputs, workspace),
            CompositionMode::Slideshow => self.slideshow_stages(request, inputs, audio, workspace),
            CompositionMode::AudioVideoSubtitle => {
                self.avs_stages(request, inputs, audio, cues, workspace)
            }
        }
    }

    /// Extract keyframes as a JPEG sequence: every I-frame, or one frame per
    /// `interval_secs` when given.
    pub fn keyframe_stage(
        &self,
        input: &ResolvedInput,
        interval_secs: Option<f64>,
        out_dir: &Path,
    ) -> PipelineStage {
        let select = match interval_secs {
            Some(interval) => format!("fps=1/{}", interval),
            None => "select='eq(pict_type,I)'".to_string(),
        };

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.path.display().to_string(),
            "-vf".to_string(),
            select,
            "-vsync".to_string(),
            "vfr".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
        ];
        let output = out_dir.join("frame_%04d.jpg");
        args.extend(self.tail_args());
        args.push(output.display().to_string());

        PipelineStage::new("extract keyframes", args, output)
            .with_inputs(vec![input.path.clone()])
            .with_duration(input.info.duration_secs)
    }

    /// Extract mono 16 kHz PCM audio for the transcriber.
    pub fn audio_extract_stage(&self, input: &ResolvedInput, out: &Path) -> PipelineStage {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.path.display().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-ac".to_string(),
            "1".to_string(),
        ];
        args.extend(self.tail_args());
        args.push(out.display().to_string());

        PipelineStage::new("extract audio", args, out.to_path_buf())
            .with_inputs(vec![input.path.clone()])
            .with_duration(input.info.duration_secs)
    }

    // ========================================================================
    // Mode synthesis
    // ========================================================================

    fn concat_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        // The concat demuxer requires a uniform stream layout, so every input
        // is normalized first; audio is stripped everywhere if any input
        // lacks it.
        let strip_audio = inputs.iter().any(|i| !i.info.has_audio());

        let mut stages = Vec::with_capacity(inputs.len() + 1);
        let mut normalized = Vec::with_capacity(inputs.len());
        let mut total_duration = 0.0;

        for (index, resolved) in inputs.iter().enumerate() {
            let clip = &request.inputs[index];
            let stage =
                self.normalize_stage(index, clip, resolved, &request.output, strip_audio, workspace);
            total_duration += effective_duration(clip, &resolved.info);
            normalized.push(stage.output.clone());
            stages.push(stage);
        }

        let manifest = ConcatManifest {
            path: workspace.join("concat.txt"),
            entries: normalized.clone(),
        };

        let output = final_output_path(workspace, &request.output);
        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.path.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
        ];
        args.extend(self.tail_args());
        args.push(output.display().to_string());

        let mut combine = PipelineStage::new("combine segments", args, output)
            .with_inputs(normalized)
            .with_duration(total_duration);
        combine.manifest = Some(manifest);
        stages.push(combine);

        Ok(stages)
    }

    fn pip_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        let output_spec = &request.output;
        let main_idx = request
            .inputs
            .iter()
            .position(|i| i.role == Some(InputRole::Main))
            .expect("validated: exactly one main input");

        // Argv order: main first, overlays in request order.
        let mut order = vec![main_idx];
        order.extend((0..inputs.len()).filter(|&i| i != main_idx));

        let mut args = vec!["-y".to_string()];
        let mut declared = Vec::new();
        for &idx in &order {
            args.extend(input_args(&request.inputs[idx], &inputs[idx]));
            declared.push(inputs[idx].path.clone());
        }

        let mut graph = FilterGraph::new();
        graph.chain(
            &["0:v"],
            fit_filter(output_spec.width, output_spec.height, output_spec.fps),
            &["base"],
        );

        let mut current = "base".to_string();
        for (layer, &idx) in order[1..].iter().enumerate() {
            let placement = request.inputs[idx]
                .placement
                .expect("validated: overlays carry placement");

            let mut overlay_filter = exact_scale_filter(placement.width, placement.height);
            if placement.opacity < 1.0 {
                overlay_filter.push_str(&format!(
                    ",format=yuva420p,colorchannelmixer=aa={}",
                    placement.opacity
                ));
            }

            let scaled = format!("ov{}", layer);
            let composed = format!("v{}", layer);
            let argv_pad = format!("{}:v", layer + 1);
            graph.chain(&[argv_pad.as_str()], overlay_filter, &[scaled.as_str()]);
            graph.chain(
                &[current.as_str(), scaled.as_str()],
                format!("overlay={}:{}", placement.x, placement.y),
                &[composed.as_str()],
            );
            current = composed;
        }

        let main_clip = &request.inputs[main_idx];
        let main_duration = effective_duration(main_clip, &inputs[main_idx].info);

        args.push("-filter_complex".to_string());
        args.push(graph.render());
        args.push("-map".to_string());
        args.push(format!("[{}]", current));

        // Audio follows the main input.
        if inputs[main_idx].info.has_audio() {
            args.push("-map".to_string());
            args.push("0:a".to_string());
            if let Some(volume) = main_clip.volume {
                args.push("-af".to_string());
                args.push(format!("volume={}", volume));
            }
        }

        args.extend(encode_args(output_spec));
        args.push("-t".to_string());
        args.push(format_secs(main_duration));
        args.extend(self.tail_args());

        let output = final_output_path(workspace, output_spec);
        args.push(output.display().to_string());

        Ok(vec![PipelineStage::new("compose overlays", args, output)
            .with_inputs(declared)
            .with_duration(main_duration)])
    }

    fn side_by_side_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        let output_spec = &request.output;
        let mut args = vec!["-y".to_string()];
        let mut declared = Vec::new();
        for (index, resolved) in inputs.iter().enumerate() {
            args.extend(input_args(&request.inputs[index], resolved));
            declared.push(resolved.path.clone());
        }

        let per_input_filter = match request.layout {
            Layout::Horizontal => format!(
                "scale=-2:{}:force_original_aspect_ratio=decrease,setsar=1,fps={}",
                output_spec.height, output_spec.fps
            ),
            Layout::Vertical => format!(
                "scale={}:-2:force_original_aspect_ratio=decrease,setsar=1,fps={}",
                output_spec.width, output_spec.fps
            ),
        };

        let mut graph = FilterGraph::new();
        let mut scaled_labels = Vec::new();
        for index in 0..inputs.len() {
            let label = format!("s{}", index);
            let pad = format!("{}:v", index);
            graph.chain(&[pad.as_str()], per_input_filter.clone(), &[label.as_str()]);
            scaled_labels.push(label);
        }

        let stack = match request.layout {
            Layout::Horizontal => format!("hstack=inputs={}", inputs.len()),
            Layout::Vertical => format!("vstack=inputs={}", inputs.len()),
        };
        let label_refs: Vec<&str> = scaled_labels.iter().map(|s| s.as_str()).collect();
        graph.chain(&label_refs, stack, &["stack"]);
        graph.chain(
            &["stack"],
            fit_filter(output_spec.width, output_spec.height, output_spec.fps),
            &["vout"],
        );

        args.push("-filter_complex".to_string());
        args.push(graph.render());
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.push("-map".to_string());
        args.push("0:a?".to_string());
        if let Some(volume) = request.inputs[0].volume {
            args.push("-af".to_string());
            args.push(format!("volume={}", volume));
        }
        args.extend(encode_args(output_spec));
        args.extend(self.tail_args());

        let duration = inputs
            .iter()
            .zip(&request.inputs)
            .map(|(resolved, clip)| effective_duration(clip, &resolved.info))
            .fold(0.0f64, f64::max);

        let output = final_output_path(workspace, output_spec);
        args.push(output.display().to_string());

        Ok(vec![PipelineStage::new("stack inputs", args, output)
            .with_inputs(declared)
            .with_duration(duration)])
    }

    fn grid_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        let output_spec = &request.output;
        let (rows, cols) = grid_dimensions(inputs.len(), request.grid.map(|g| (g.rows, g.cols)));
        let cell_w = output_spec.width / cols;
        let cell_h = output_spec.height / rows;
        let cells = (rows * cols) as usize;

        let mut args = vec!["-y".to_string()];
        let mut declared = Vec::new();
        for (index, resolved) in inputs.iter().enumerate() {
            args.extend(input_args(&request.inputs[index], resolved));
            declared.push(resolved.path.clone());
        }

        let mut graph = FilterGraph::new();
        let mut tiles = Vec::with_capacity(cells);
        for index in 0..inputs.len() {
            let label = format!("t{}", index);
            let pad = format!("{}:v", index);
            graph.chain(
                &[pad.as_str()],
                fit_filter(cell_w, cell_h, output_spec.fps),
                &[label.as_str()],
            );
            tiles.push(label);
        }

        // Empty cells become black sources so the layout stays rectangular.
        for index in inputs.len()..cells {
            let label = format!("t{}", index);
            graph.source(
                format!(
                    "color=c=black:s={}x{}:r={}",
                    cell_w, cell_h, output_spec.fps
                ),
                &[label.as_str()],
            );
            tiles.push(label);
        }

        let duration = inputs
            .iter()
            .zip(&request.inputs)
            .map(|(resolved, clip)| effective_duration(clip, &resolved.info))
            .fold(0.0f64, f64::max);

        if cells == 1 {
            graph.chain(
                &["t0"],
                fit_filter(output_spec.width, output_spec.height, output_spec.fps),
                &["vout"],
            );
        } else {
            let layout: Vec<String> = (0..cells)
                .map(|index| {
                    let row = index as u32 / cols;
                    let col = index as u32 % cols;
                    format!("{}_{}", col * cell_w, row * cell_h)
                })
                .collect();

            let tile_refs: Vec<&str> = tiles.iter().map(|s| s.as_str()).collect();
            graph.chain(
                &tile_refs,
                format!("xstack=inputs={}:layout={}", cells, layout.join("|")),
                &["grid"],
            );
            // Integer cell division can undershoot the target size slightly.
            graph.chain(
                &["grid"],
                format!("scale={}:{},setsar=1", output_spec.width, output_spec.height),
                &["vout"],
            );
        }

        args.push("-filter_complex".to_string());
        args.push(graph.render());
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.push("-map".to_string());
        args.push("0:a?".to_string());
        args.extend(encode_args(output_spec));
        // Black filler sources are unbounded; the output duration is pinned
        // to the longest real input.
        args.push("-t".to_string());
        args.push(format_secs(duration));
        args.extend(self.tail_args());

        let output = final_output_path(workspace, output_spec);
        args.push(output.display().to_string());

        Ok(vec![PipelineStage::new(
            format!("tile {}x{} grid", rows, cols),
            args,
            output,
        )
        .with_inputs(declared)
        .with_duration(duration)])
    }

    fn slideshow_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        audio: Option<&ResolvedInput>,
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        let output_spec = &request.output;
        let mut stages = Vec::with_capacity(inputs.len() + 2);
        let mut segments = Vec::with_capacity(inputs.len());
        let mut total_duration = 0.0;

        for (index, resolved) in inputs.iter().enumerate() {
            let clip = &request.inputs[index];
            let hold = clip.hold_secs.unwrap_or(DEFAULT_HOLD_SECS);
            let transition = request.transition_secs.min(hold / 2.0);

            let mut filter = fit_filter(output_spec.width, output_spec.height, output_spec.fps);
            if transition > 0.0 {
                filter.push_str(&format!(
                    ",fade=t=in:st=0:d={tr},fade=t=out:st={st}:d={tr}",
                    tr = format_secs(transition),
                    st = format_secs(hold - transition),
                ));
            }

            let segment = workspace.join(format!(
                "slide_{:02}.{}",
                index,
                output_spec.container.extension()
            ));
            let mut args = vec![
                "-y".to_string(),
                "-loop".to_string(),
                "1".to_string(),
                "-i".to_string(),
                resolved.path.display().to_string(),
                "-t".to_string(),
                format_secs(hold),
                "-vf".to_string(),
                filter,
                "-an".to_string(),
            ];
            args.extend(encode_video_args(output_spec));
            args.extend(self.tail_args());
            args.push(segment.display().to_string());

            stages.push(
                PipelineStage::new(format!("render slide {}", index + 1), args, segment.clone())
                    .with_inputs(vec![resolved.path.clone()])
                    .with_duration(hold),
            );
            segments.push(segment);
            total_duration += hold;
        }

        let manifest = ConcatManifest {
            path: workspace.join("concat.txt"),
            entries: segments.clone(),
        };

        let slides_out = if audio.is_some() {
            workspace.join(format!("slides.{}", output_spec.container.extension()))
        } else {
            final_output_path(workspace, output_spec)
        };

        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.path.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
        ];
        args.extend(self.tail_args());
        args.push(slides_out.display().to_string());

        let mut combine = PipelineStage::new("combine slides", args, slides_out.clone())
            .with_inputs(segments)
            .with_duration(total_duration);
        combine.manifest = Some(manifest);
        stages.push(combine);

        if let Some(audio) = audio {
            let track = request
                .audio_track
                .as_ref()
                .expect("resolved audio implies audio_track");
            stages.push(self.slideshow_mux_stage(
                track,
                audio,
                &slides_out,
                total_duration,
                output_spec,
                workspace,
            ));
        }

        Ok(stages)
    }

    fn slideshow_mux_stage(
        &self,
        track: &AudioTrack,
        audio: &ResolvedInput,
        slides: &Path,
        slides_duration: f64,
        output_spec: &OutputSpec,
        workspace: &Path,
    ) -> PipelineStage {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            slides.display().to_string(),
        ];
        if track.loop_audio {
            args.push("-stream_loop".to_string());
            args.push("-1".to_string());
        }
        args.push("-i".to_string());
        args.push(audio.path.display().to_string());

        args.push("-map".to_string());
        args.push("0:v".to_string());
        args.push("-map".to_string());
        args.push("1:a".to_string());
        if let Some(volume) = track.volume {
            args.push("-af".to_string());
            args.push(format!("volume={}", volume));
        }
        args.push("-c:v".to_string());
        args.push("copy".to_string());
        args.push("-c:a".to_string());
        args.push(output_spec.audio_codec.ffmpeg_name().to_string());
        if let Some(kbps) = output_spec.audio_bitrate_kbps {
            args.push("-b:a".to_string());
            args.push(format!("{}k", kbps));
        }
        args.push("-shortest".to_string());
        args.extend(self.tail_args());

        let output = final_output_path(workspace, output_spec);
        args.push(output.display().to_string());

        // Looping audio runs until the slides end; otherwise -shortest clips
        // to the shorter stream.
        let duration = if track.loop_audio {
            slides_duration
        } else {
            slides_duration.min(audio.info.duration_secs)
        };

        PipelineStage::new("mux audio bed", args, output)
            .with_inputs(vec![slides.to_path_buf(), audio.path.clone()])
            .with_duration(duration)
    }

    fn avs_stages(
        &self,
        request: &CompositionRequest,
        inputs: &[ResolvedInput],
        audio: Option<&ResolvedInput>,
        cues: Option<&[Cue]>,
        workspace: &Path,
    ) -> Result<Vec<PipelineStage>, SynthError> {
        let output_spec = &request.output;
        let video = &inputs[0];
        let clip = &request.inputs[0];
        let audio = audio.expect("validated: audio_video_subtitle carries audio_track");
        let track = request
            .audio_track
            .as_ref()
            .expect("validated: audio_video_subtitle carries audio_track");

        let mut args = vec!["-y".to_string()];
        args.extend(input_args(clip, video));
        args.push("-i".to_string());
        args.push(audio.path.display().to_string());

        let mut graph = FilterGraph::new();
        let cue_file = cues.map(|cues| CueFile {
            path: workspace.join("subs.srt"),
            cues: cues.to_vec(),
        });

        if cue_file.is_some() {
            graph.chain(
                &["0:v"],
                fit_filter(output_spec.width, output_spec.height, output_spec.fps),
                &["vbase"],
            );
            // The stage runs with the workspace as cwd, so the subtitle path
            // stays relative and needs no filter-escaping.
            graph.chain(
                &["vbase"],
                format!(
                    "subtitles=subs.srt:force_style='{}'",
                    burn_in_style(&self.subtitle)
                ),
                &["vout"],
            );
        } else {
            graph.chain(
                &["0:v"],
                fit_filter(output_spec.width, output_spec.height, output_spec.fps),
                &["vout"],
            );
        }

        let volume = track.volume.unwrap_or(1.0);
        let audio_label = if (volume - 1.0).abs() > f32::EPSILON {
            graph.chain(&["1:a"], format!("volume={}", volume), &["aout"]);
            "[aout]".to_string()
        } else {
            "1:a".to_string()
        };

        args.push("-filter_complex".to_string());
        args.push(graph.render());
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.push("-map".to_string());
        args.push(audio_label);
        args.extend(encode_args(output_spec));
        // Shorter-stream policy: no trailing silence or black frames.
        args.push("-shortest".to_string());
        args.extend(self.tail_args());

        let output = final_output_path(workspace, output_spec);
        args.push(output.display().to_string());

        let duration = effective_duration(clip, &video.info).min(audio.info.duration_secs);

        let mut stage = PipelineStage::new("mux audio and subtitles", args, output)
            .with_inputs(vec![video.path.clone(), audio.path.clone()])
            .with_duration(duration);
        stage.workdir = Some(workspace.to_path_buf());
        stage.cue_file = cue_file;

        Ok(vec![stage])
    }

    // ========================================================================
    // Shared pieces
    // ========================================================================

    fn normalize_stage(
        &self,
        index: usize,
        clip: &InputClip,
        resolved: &ResolvedInput,
        output_spec: &OutputSpec,
        strip_audio: bool,
        workspace: &Path,
    ) -> PipelineStage {
        let mut args = vec!["-y".to_string()];
        args.extend(input_args(clip, resolved));
        args.push("-vf".to_string());
        args.push(fit_filter(
            output_spec.width,
            output_spec.height,
            output_spec.fps,
        ));

        if strip_audio || !resolved.info.has_audio() {
            args.push("-an".to_string());
            args.extend(encode_video_args(output_spec));
        } else {
            if let Some(volume) = clip.volume {
                args.push("-af".to_string());
                args.push(format!("volume={}", volume));
            }
            args.extend(encode_args(output_spec));
        }
        args.extend(self.tail_args());

        let output = workspace.join(format!(
            "norm_{:02}.{}",
            index,
            output_spec.container.extension()
        ));
        args.push(output.display().to_string());

        PipelineStage::new(format!("normalize input {}", index + 1), args, output)
            .with_inputs(vec![resolved.path.clone()])
            .with_duration(effective_duration(clip, &resolved.info))
    }

    fn tail_args(&self) -> Vec<String> {
        let mut args = vec![
            "-loglevel".to_string(),
            self.ffmpeg.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        args.extend(self.ffmpeg.extra_args.iter().cloned());
        args
    }
}

/// Trim and input arguments for one clip.
fn input_args(clip: &InputClip, resolved: &ResolvedInput) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(trim) = &clip.trim {
        args.push("-ss".to_string());
        args.push(format_secs(trim.start));
        args.push("-t".to_string());
        args.push(format_secs(trim.end - trim.start));
    }
    args.push("-i".to_string());
    args.push(resolved.path.display().to_string());
    args
}

/// Encoder arguments for video and audio streams.
fn encode_args(output_spec: &OutputSpec) -> Vec<String> {
    let mut args = encode_video_args(output_spec);
    args.push("-c:a".to_string());
    args.push(output_spec.audio_codec.ffmpeg_name().to_string());
    if let Some(kbps) = output_spec.audio_bitrate_kbps {
        args.push("-b:a".to_string());
        args.push(format!("{}k", kbps));
    }
    args
}

/// Encoder arguments for the video stream only.
fn encode_video_args(output_spec: &OutputSpec) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        output_spec.video_codec.ffmpeg_name().to_string(),
    ];
    match output_spec.video_bitrate_kbps {
        Some(kbps) => {
            args.push("-b:v".to_string());
            args.push(format!("{}k", kbps));
        }
        None => {
            args.push("-crf".to_string());
            args.push("23".to_string());
        }
    }
    args
}

/// Duration the pipeline will actually process for a clip.
fn effective_duration(clip: &InputClip, info: &MediaInfo) -> f64 {
    match &clip.trim {
        Some(trim) => {
            let start = trim.start.min(info.duration_secs);
            let end = trim.end.min(info.duration_secs);
            (end - start).max(0.0)
        }
        None => info.duration_secs,
    }
}

/// Grid dimensions: explicit when requested, otherwise the smallest
/// square-ish grid (`cols = ceil(sqrt(N))`, `rows = ceil(N / cols)`).
fn grid_dimensions(count: usize, explicit: Option<(u32, u32)>) -> (u32, u32) {
    if let Some((rows, cols)) = explicit {
        return (rows.max(1), cols.max(1));
    }
    let cols = (count as f64).sqrt().ceil() as u32;
    let cols = cols.max(1);
    let rows = (count as u32).div_ceil(cols);
    (rows.max(1), cols)
}

fn final_output_path(workspace: &Path, output_spec: &OutputSpec) -> PathBuf {
    workspace.join(format!("output.{}", output_spec.container.extension()))
}

fn format_secs(secs: f64) -> String {
    format!("{:.3}", secs)
}
