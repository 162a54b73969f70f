//! Conversion of non-SRT subtitle sources into a cue list.
//!
//! Plain text is split into sentences and timed proportionally to character
//! count; VTT and ASS/SSA documents are reduced to their timed text.

use std::path::Path;

use crate::config::SubtitleConfig;

use super::cue::{parse_srt, parse_timestamp, Cue, SubtitleError};

/// Characters-per-second reading rate used when no total duration is known.
const READING_RATE_CPS: f64 = 15.0;

/// Detected subtitle source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    PlainText,
}

/// Guess the subtitle format from the file extension, falling back to
/// content sniffing for extension-less sources.
pub fn detect_format(path: &Path, content: &str) -> SubtitleFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("srt") => SubtitleFormat::Srt,
        Some("vtt") => SubtitleFormat::Vtt,
        Some("ass") | Some("ssa") => SubtitleFormat::Ass,
        Some("txt") => SubtitleFormat::PlainText,
        _ => {
            if content.trim_start().starts_with("WEBVTT") {
                SubtitleFormat::Vtt
            } else if content.contains("[Script Info]") || content.contains("Dialogue:") {
                SubtitleFormat::Ass
            } else if content.contains("-->") {
                SubtitleFormat::Srt
            } else {
                SubtitleFormat::PlainText
            }
        }
    }
}

/// Normalize any supported subtitle source into an ordered cue list.
///
/// `total_duration` bounds plain-text timing when known (e.g. the audio
/// track's duration in audio_video_subtitle mode).
pub fn normalize_to_cues(
    path: &Path,
    content: &str,
    total_duration: Option<f64>,
    config: &SubtitleConfig,
) -> Result<Vec<Cue>, SubtitleError> {
    match detect_format(path, content) {
        SubtitleFormat::Srt => parse_srt(content),
        SubtitleFormat::Vtt => parse_vtt(content),
        SubtitleFormat::Ass => parse_ass(content),
        SubtitleFormat::PlainText => cues_from_plain_text(content, total_duration, config),
    }
}

/// Parse a WebVTT document into cues.
pub fn parse_vtt(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let body = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in body.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }
        // Skip the header and NOTE/STYLE blocks.
        if lines[0].starts_with("WEBVTT")
            || lines[0].starts_with("NOTE")
            || lines[0].starts_with("STYLE")
        {
            continue;
        }

        let timing_idx = match lines.iter().position(|l| l.contains("-->")) {
            Some(idx) => idx,
            None => continue,
        };

        // Cue settings after the end timestamp (position, align) are dropped.
        let (start_raw, rest) = match lines[timing_idx].split_once("-->") {
            Some(pair) => pair,
            None => continue,
        };
        let end_raw = rest.trim().split_whitespace().next().unwrap_or("");

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

/// Parse ASS/SSA `Dialogue:` events into cues.
///
/// Override tags (`{\...}`) are stripped; `\N` becomes a line break.
pub fn parse_ass(content: &str) -> Result<Vec<Cue>, SubtitleError> {
    let mut cues = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let Some(event) = line.strip_prefix("Dialogue:") else {
            continue;
        };

        // Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
        let fields: Vec<&str> = event.splitn(10, ',').collect();
        if fields.len() < 10 {
            continue;
        }

        let start = parse_timestamp(fields[1])?;
        let end = parse_timestamp(fields[2])?;
        let text = strip_ass_tags(fields[9]);
        if text.is_empty() {
            continue;
        }

        cues.push(Cue::new(start, end, text));
    }

    if cues.is_empty() {
        return Err(SubtitleError::Empty);
    }

    cues.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    Ok(cues)
}

fn strip_ass_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '{' => in_tag = true,
            '}' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("\\N", "\n").replace("\\n", "\n").trim().to_string()
}

/// Split plain text into sentence cues with character-proportional timing.
///
/// Each cue's duration is clamped to the configured floor/ceiling; cues are
/// strictly sequential and non-overlapping. When `total_duration` is given
/// the timeline is rescaled to fit inside it.
pub fn cues_from_plain_text(
    text: &str,
    total_duration: Option<f64>,
    config: &SubtitleConfig,
) -> Result<Vec<Cue>, SubtitleError> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(SubtitleError::Empty);
    }

    let durations: Vec<f64> = sentences
        .iter()
        .map(|s| {
            let natural = s.chars().count() as f64 / READING_RATE_CPS;
            natural.clamp(config.min_cue_secs, config.max_cue_secs)
        })
        .collect();

    let natural_total: f64 = durations.iter().sum();
    // Compress to fit a known media window; never stretch to fill it.
    let scale = match total_duration {
        Some(total) if total > 0.0 && natural_total > total => total / natural_total,
        _ => 1.0,
    };

    let mut cues = Vec::with_capacity(sentences.len());
    let mut cursor = 0.0;
    for (sentence, duration) in sentences.into_iter().zip(durations) {
        let scaled = duration * scale;
        cues.push(Cue::new(cursor, cursor + scaled, sentence));
        cursor += scaled;
    }

    Ok(cues)
}

/// Split text into sentences on sentence-ending punctuation, keeping the
/// punctuation with its sentence. Handles both ASCII and CJK terminators.
pub fn split_sentences(text: &str) -> Vec<String> {
    const TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if TERMINATORS.contains(&ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}
