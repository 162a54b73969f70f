//! Subtitle cue model, parsing and conversion.
//!
//! Anything that is not already SRT (plain text, VTT, ASS/SSA) is normalized
//! to a cue list before burn-in; the engine then writes an SRT file into the
//! task workspace for the subtitles filter.

mod convert;
mod cue;

pub use convert::{
    cues_from_plain_text, detect_format, normalize_to_cues, parse_ass, parse_vtt, split_sentences,
    SubtitleFormat,
};
pub use cue::{format_srt_time, parse_srt, parse_timestamp, to_srt, Cue, SubtitleError};

use crate::config::SubtitleConfig;

/// Render the ASS `force_style` clause for the subtitles burn-in filter.
pub fn burn_in_style(config: &SubtitleConfig) -> String {
    format!(
        "FontSize={},PrimaryColour=&H{},OutlineColour=&H{},Outline=2",
        config.font_size, config.font_colour, config.outline_colour
    )
}
