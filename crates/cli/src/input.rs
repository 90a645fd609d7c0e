//! Batch input parsing

use std::fs;
use std::io;
use std::path::Path;

/// Read URLs from a batch file: one per line, blank lines and `#` comments
/// ignored, input order preserved.
pub fn read_urls(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_urls(&content))
}

fn parse_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
