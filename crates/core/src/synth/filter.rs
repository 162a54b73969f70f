//! Typed FFmpeg filter-graph builder.
//!
//! Filter chains are collected as nodes with explicit input/output labels and
//! serialized to the `-filter_complex` textual syntax in one final step, so
//! the synthesis logic stays testable without string surgery.

/// One filter invocation with labeled pads.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    filter: String,
    outputs: Vec<String>,
}

/// An ordered filter graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chain. Labels are bare (no brackets); stream specifiers such
    /// as `0:v` are valid input labels.
    pub fn chain(
        &mut self,
        inputs: &[&str],
        filter: impl Into<String>,
        outputs: &[&str],
    ) -> &mut Self {
        self.chains.push(FilterChain {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            filter: filter.into(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// A source chain with no input pads (e.g. `color=...`).
    pub fn source(&mut self, filter: impl Into<String>, outputs: &[&str]) -> &mut Self {
        self.chain(&[], filter, outputs)
    }

    /// Number of chains in the graph.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the graph has no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Serialize to FFmpeg `-filter_complex` syntax.
    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(|chain| {
                let mut out = String::new();
                for input in &chain.inputs {
                    out.push('[');
                    out.push_str(input);
                    out.push(']');
                }
                out.push_str(&chain.filter);
                for output in &chain.outputs {
                    out.push('[');
                    out.push_str(output);
                    out.push(']');
                }
                out
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Scale into a box preserving aspect ratio, pad to the exact size, reset the
/// sample aspect ratio and normalize frame rate and pixel format.
pub fn fit_filter(width: u32, height: u32, fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p",
        w = width,
        h = height,
        fps = fps
    )
}

/// Scale to an exact size (used for overlay rectangles and grid tiles where
/// the caller controls the box).
pub fn exact_scale_filter(width: u32, height: u32) -> String {
    format!("scale={}:{},setsar=1", width, height)
}
