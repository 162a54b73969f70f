//! Pipeline stage description.

use std::path::PathBuf;

use crate::subtitle::Cue;

/// A concat demuxer manifest the engine materializes before the stage runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatManifest {
    /// Where the manifest file must be written.
    pub path: PathBuf,
    /// Files listed in order.
    pub entries: Vec<PathBuf>,
}

impl ConcatManifest {
    /// Render the ffconcat document.
    pub fn render(&self) -> String {
        let mut out = String::from("ffconcat version 1.0\n");
        for entry in &self.entries {
            // Single quotes in paths are escaped per the concat demuxer rules.
            let escaped = entry.display().to_string().replace('\'', "'\\''");
            out.push_str(&format!("file '{}'\n", escaped));
        }
        out
    }
}

/// A subtitle file the engine materializes before the stage runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CueFile {
    /// Where the SRT file must be written.
    pub path: PathBuf,
    /// Cues in order.
    pub cues: Vec<Cue>,
}

/// One external-process invocation within a task's execution plan.
///
/// The argument vector is complete except for the binary itself; declared
/// inputs and outputs let the engine chain stages and account artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    /// Human-readable stage name, surfaced as the task's `stage` field.
    pub name: String,

    /// Arguments passed to ffmpeg (binary excluded).
    pub args: Vec<String>,

    /// Declared input files.
    pub inputs: Vec<PathBuf>,

    /// Declared output file (or output pattern for image sequences).
    pub output: PathBuf,

    /// Working directory for the spawned process. Relative paths inside
    /// filter expressions (subtitles=...) resolve against this.
    pub workdir: Option<PathBuf>,

    /// Duration of the media this stage processes, when known. Drives both
    /// the progress ratio and the wall-clock budget.
    pub source_duration_secs: Option<f64>,

    /// Explicit wall-clock budget override in seconds.
    pub timeout_secs: Option<u64>,

    /// Concat manifest to write before spawning.
    pub manifest: Option<ConcatManifest>,

    /// Subtitle file to write before spawning.
    pub cue_file: Option<CueFile>,
}

impl PipelineStage {
    /// Create a stage with only the required fields set.
    pub fn new(name: impl Into<String>, args: Vec<String>, output: PathBuf) -> Self {
        Self {
            name: name.into(),
            args,
            inputs: Vec::new(),
            output,
            workdir: None,
            source_duration_secs: None,
            timeout_secs: None,
            manifest: None,
            cue_file: None,
        }
    }

    /// Record declared inputs.
    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Record the processed media duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.source_duration_secs = Some(secs);
        self
    }

    /// Override the wall-clock budget.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_render() {
        let manifest = ConcatManifest {
            path: PathBuf::from("/work/list.txt"),
            entries: vec![
                PathBuf::from("/work/norm_00.mp4"),
                PathBuf::from("/work/norm_01.mp4"),
            ],
        };

        let rendered = manifest.render();
        assert!(rendered.starts_with("ffconcat version 1.0\n"));
        assert!(rendered.contains("file '/work/norm_00.mp4'\n"));
        assert!(rendered.contains("file '/work/norm_01.mp4'\n"));
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let manifest = ConcatManifest {
            path: PathBuf::from("/work/list.txt"),
            entries: vec![PathBuf::from("/work/it's.mp4")],
        };
        assert!(manifest.render().contains("it'\\''s.mp4"));
    }

    #[test]
    fn test_stage_builder() {
        let stage = PipelineStage::new(
            "combine",
            vec!["-y".to_string()],
            PathBuf::from("/work/out.mp4"),
        )
        .with_inputs(vec![PathBuf::from("/work/in.mp4")])
        .with_duration(25.0)
        .with_timeout(60);

        assert_eq!(stage.name, "combine");
        assert_eq!(stage.source_duration_secs, Some(25.0));
        assert_eq!(stage.timeout_secs, Some(60));
        assert_eq!(stage.inputs.len(), 1);
    }
}
