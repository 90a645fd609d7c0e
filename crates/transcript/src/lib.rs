//! Caption-to-transcript conversion
//!
//! Turns a downloaded caption file (SRT or WebVTT) into a plain-text
//! transcript: cue indices and timing lines dropped, inline markup stripped,
//! whitespace collapsed, and the text re-flowed to a fixed column width.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;
use video_snapshot_common::Result;

const HEADER: &str = "VIDEO TRANSCRIPT";
const HEADER_RULE_WIDTH: usize = 50;

/// Transcript rendering settings
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Column width the transcript body is wrapped to
    pub line_width: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self { line_width: 80 }
    }
}

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Timing line in either format: `00:00:01,000 --> 00:00:02,500`
fn is_timing_line(line: &str) -> bool {
    line.contains("-->")
}

/// Bare SRT cue index
fn is_cue_index(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Reduce caption file content to collapsed, wrapped plain text
#[must_use]
pub fn caption_to_text(content: &str, config: &TranscriptConfig) -> String {
    let mut fragments: Vec<&str> = Vec::new();
    let mut in_metadata_block = false;

    for line in content.lines() {
        let line = line.trim_start_matches('\u{feff}').trim();

        if line.is_empty() {
            in_metadata_block = false;
            continue;
        }
        if in_metadata_block {
            continue;
        }
        if line == "WEBVTT" || line.starts_with("WEBVTT ") {
            continue;
        }
        // VTT metadata blocks run until the next blank line
        if line.starts_with("NOTE") || line.starts_with("STYLE") || line.starts_with("REGION") {
            in_metadata_block = true;
            continue;
        }
        if is_timing_line(line) || is_cue_index(line) {
            continue;
        }

        fragments.push(line);
    }

    let joined = fragments.join(" ");
    let stripped = markup_pattern().replace_all(&joined, "");
    let collapsed = whitespace_pattern().replace_all(stripped.trim(), " ");
    wrap(&collapsed, config.line_width)
}

/// Greedy word wrap to at most `width` characters per line
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Convert a caption file and write the transcript to `output_path`.
///
/// Caption files arrive from an external tool, so undecodable bytes are
/// replaced rather than treated as fatal.
pub fn write_transcript(
    caption_path: &Path,
    output_path: &Path,
    config: &TranscriptConfig,
) -> Result<()> {
    let bytes = fs::read(caption_path)?;
    let content = String::from_utf8_lossy(&bytes);
    let body = caption_to_text(&content, config);

    let mut rendered = String::with_capacity(body.len() + HEADER.len() + HEADER_RULE_WIDTH + 4);
    rendered.push_str(HEADER);
    rendered.push('\n');
    rendered.push_str(&"=".repeat(HEADER_RULE_WIDTH));
    rendered.push_str("\n\n");
    rendered.push_str(&body);
    rendered.push('\n');

    fs::write(output_path, rendered)?;
    debug!("Wrote transcript to {}", output_path.display());
    Ok(())
}
