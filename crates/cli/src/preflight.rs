//! External tool preflight
//!
//! Checked once, before any job starts; a missing tool is the only error
//! that halts the whole batch.

use video_snapshot_common::{ProcessingError, Result};

const REQUIRED_TOOLS: &[&str] = &["yt-dlp", "ffmpeg", "ffprobe"];

/// Verify every required external tool resolves on PATH
pub fn check_dependencies() -> Result<()> {
    check_tools(REQUIRED_TOOLS)
}

fn check_tools(tools: &[&str]) -> Result<()> {
    for tool in tools {
        which::which(tool)
            .map_err(|_| ProcessingError::DependencyMissing((*tool).to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_reported_by_name() {
        let err = check_tools(&["definitely-not-a-real-tool-0x9f"]).unwrap_err();
        assert!(matches!(err, ProcessingError::DependencyMissing(_)));
        assert!(err.to_string().contains("definitely-not-a-real-tool-0x9f"));
    }

    #[test]
    fn test_empty_tool_list_passes() {
        assert!(check_tools(&[]).is_ok());
    }
}
