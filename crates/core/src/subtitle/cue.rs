//! Timed subtitle cues and SRT serialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single timed subtitle entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Cue text (may contain newlines).
    pub text: String,
}

impl Cue {
    /// Create a cue.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Duration of the cue in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Error type for subtitle parsing.
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("malformed timestamp: {0}")]
    BadTimestamp(String),

    #[error("no cues found in subtitle input")]
    Empty,

    #[error("failed to read subtitle file: {0}")]
    Io(#[from] std::io::Error),
}

/// Format a time in seconds as an SRT timestamp (HH:MM:SS,mmm).
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse an SRT or VTT timestamp (`HH:MM:SS,mmm`, `HH:MM:SS.mmm` or
/// `MM:SS.mmm`) into seconds.
pub fn parse_timestamp(raw: &str) -> Result<f64, SubtitleError> {
    let raw = raw.trim();
    let normalized = raw.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    let (h, m, s) = match parts.len() {
        3 => (parts[0], parts[1], parts[2]),
        2 => ("0", parts[0], parts[1]),
        _ => return Err(SubtitleError::BadTimestamp(raw.to_string())),
    };

    let hours: f64 = h
        .parse()
        .map_err(|_| SubtitleError::BadTimestamp(raw.to_string()))?;
    let minutes: f64 = m
        .parse()
        .map_err(|_| SubtitleError::BadTimestamp(raw.to_string()))?;
    let seconds: f64 = s
        .parse()
        .map_err(|_| SubtitleError::BadTimestamp(raw.to_string()))?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Serialize cues as an SRT document.
pub fn to_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (index, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text.trim()
        ));
    }
    out
}

/// Parse an SRT document into cues.
///
/// Index lines are ignored; cue order is the document order.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let mut cues = Vec::new();

    for block in content.replace("\r\n", "\n").split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }

        // First line may be the numeric index; the timing line contains "-->".
        let timing_idx = match lines.iter().position(|l| l.contains("-->")) {
            Some(idx) => idx,
            None => continue,
        };

        let (start_raw, end_raw) = match lines[timing_idx].split_once("-->") {
            Some(pair) => pair,
            None => continue,
        };

        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw)?;
        let text = lines[timing_idx + 1..].join("\n");
        if text.is_empty() {
            continue;
        }

        cues.push(Cue::new(start, end, text));
    }

    if cues.is_empty() {
        return Err(SubtitleError::Empty);
    }

    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("00:00:05,000").unwrap(), 5.0);
        assert_eq!(parse_timestamp("00:01:05.123").unwrap(), 65.123);
        assert_eq!(parse_timestamp("01:05.5").unwrap(), 65.5);
        assert!(parse_timestamp("nonsense").is_err());
    }

    #[test]
    fn test_srt_round_trip() {
        let cues = vec![
            Cue::new(0.0, 5.0, "First line"),
            Cue::new(5.0, 10.0, "Second line"),
        ];

        let srt = to_srt(&cues);
        assert!(srt.contains("00:00:00,000 --> 00:00:05,000"));

        let parsed = parse_srt(&srt).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "First line");
        assert_eq!(parsed[1].start, 5.0);
    }

    #[test]
    fn test_parse_srt_multiline_text() {
        let srt = "1\n00:00:00,000 --> 00:00:03,000\nline one\nline two\n\n";
        let cues = parse_srt(srt).unwrap();
        assert_eq!(cues[0].text, "line one\nline two");
    }

    #[test]
    fn test_parse_srt_empty_input() {
        assert!(matches!(parse_srt(""), Err(SubtitleError::Empty)));
    }
}
