//! Title sanitization
//!
//! Reduces a raw video title to a path segment that is valid on all common
//! filesystems. Deterministic and total: every input, including the empty
//! string, maps to a non-empty bounded name.

/// Characters rejected by at least one common filesystem
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of a sanitized title, in characters
const MAX_LENGTH: usize = 100;

/// Fallback when nothing survives sanitization
const FALLBACK: &str = "untitled";

/// Reduce a raw title to a valid, bounded path segment.
///
/// Strips filesystem-illegal and control characters, trims leading and
/// trailing dots and spaces, collapses runs of spaces to a single `_`, and
/// truncates to [`MAX_LENGTH`] characters.
#[must_use]
pub fn sanitize_title(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && !c.is_control())
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == ' ');

    let mut name = String::with_capacity(trimmed.len());
    let mut in_space_run = false;
    for c in trimmed.chars() {
        if c == ' ' {
            if !in_space_run {
                name.push('_');
            }
            in_space_run = true;
        } else {
            name.push(c);
            in_space_run = false;
        }
    }

    let mut name: String = name.chars().take(MAX_LENGTH).collect();
    // Truncation can re-expose a trailing dot or separator
    while name.ends_with('.') || name.ends_with('_') {
        name.pop();
    }

    if name.is_empty() {
        FALLBACK.to_string()
    } else {
        name
    }
}
