//! Metadata fetch and media acquisition via the yt-dlp CLI
//!
//! Both collaborator contracts are traits so the pipeline can be exercised
//! without network access or the tool installed. The real implementation
//! shells out to `yt-dlp` with bounded timeouts; children are constructed
//! with `kill_on_drop` so an abandoned job cannot leak a download process.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use video_snapshot_common::{ProcessingError, Result, VideoMetadata};

/// Media file plus the caption file the same call may have deposited
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub media_path: PathBuf,
    pub caption_path: Option<PathBuf>,
}

/// Collaborator that resolves a URL to a metadata record
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<VideoMetadata>;
}

/// Collaborator that downloads media (and optionally captions) for a URL
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    async fn acquire(
        &self,
        url: &str,
        destination: &Path,
        want_captions: bool,
    ) -> Result<AcquiredMedia>;
}

/// yt-dlp invocation settings
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Binary name or path
    pub binary: String,
    /// Ceiling for a metadata probe
    pub metadata_timeout: Duration,
    /// Ceiling for a full media download
    pub download_timeout: Duration,
    /// Preferred caption language tag
    pub caption_language: String,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            metadata_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
            caption_language: "en".to_string(),
        }
    }
}

/// Real collaborator backed by the yt-dlp binary
pub struct YtDlp {
    config: YtDlpConfig,
}

impl YtDlp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(YtDlpConfig::default())
    }

    #[must_use]
    pub fn with_config(config: YtDlpConfig) -> Self {
        Self { config }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

/// Subset of the yt-dlp JSON payload the pipeline consumes
#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    subtitles: HashMap<String, serde_json::Value>,
    #[serde(default)]
    automatic_captions: HashMap<String, serde_json::Value>,
}

/// Parse a `--dump-json` payload into the metadata record
fn parse_metadata(payload: &str) -> Result<VideoMetadata> {
    let raw: RawMetadata = serde_json::from_str(payload).map_err(|e| {
        ProcessingError::MetadataFetch(format!("malformed metadata response: {e}"))
    })?;

    Ok(VideoMetadata {
        title: raw.title.unwrap_or_else(|| "untitled".to_string()),
        duration_secs: raw.duration.unwrap_or(0.0),
        uploader: raw.uploader.unwrap_or_else(|| "Unknown".to_string()),
        view_count: raw.view_count.unwrap_or(0),
        captions_available: !raw.subtitles.is_empty() || !raw.automatic_captions.is_empty(),
    })
}

/// Locate a caption file yt-dlp may have written beside the media.
///
/// Candidates are checked in order: language-tagged SRT and VTT first, then
/// the untagged variants.
#[must_use]
pub fn find_caption_file(media_path: &Path, language: &str) -> Option<PathBuf> {
    let dir = media_path.parent()?;
    let stem = media_path.file_stem()?.to_str()?;

    let candidates = [
        format!("{stem}.{language}.srt"),
        format!("{stem}.{language}.vtt"),
        format!("{stem}.srt"),
        format!("{stem}.vtt"),
    ];

    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

#[async_trait]
impl MetadataFetcher for YtDlp {
    async fn fetch(&self, url: &str) -> Result<VideoMetadata> {
        debug!("Fetching metadata for {url}");

        let mut command = Command::new(&self.config.binary);
        command
            .args(["--dump-json", "--no-playlist"])
            .arg(url)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.metadata_timeout, command.output())
            .await
            .map_err(|_| {
                ProcessingError::MetadataFetch(format!(
                    "timed out after {}s",
                    self.config.metadata_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ProcessingError::MetadataFetch(format!(
                    "failed to run {}: {e}",
                    self.config.binary
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::MetadataFetch(format!(
                "unreachable or invalid URL: {}",
                stderr.trim()
            )));
        }

        parse_metadata(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl MediaAcquirer for YtDlp {
    async fn acquire(
        &self,
        url: &str,
        destination: &Path,
        want_captions: bool,
    ) -> Result<AcquiredMedia> {
        debug!("Acquiring media for {url} into {}", destination.display());

        let mut command = Command::new(&self.config.binary);
        command
            .args(["-f", "best[ext=mp4]/best", "--no-playlist", "-o"])
            .arg(destination);

        if want_captions {
            command.args([
                "--write-auto-subs",
                "--write-subs",
                "--sub-lang",
                &self.config.caption_language,
                "--convert-subs",
                "srt",
            ]);
        }

        command.arg(url).kill_on_drop(true);

        let output = tokio::time::timeout(self.config.download_timeout, command.output())
            .await
            .map_err(|_| {
                ProcessingError::Acquisition(format!(
                    "timed out after {}s",
                    self.config.download_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                ProcessingError::Acquisition(format!("failed to run {}: {e}", self.config.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::Acquisition(stderr.trim().to_string()));
        }

        if !destination.exists() {
            return Err(ProcessingError::Acquisition(
                "no media file was written".to_string(),
            ));
        }

        // yt-dlp cannot report the caption path it chose, so re-scan by the
        // known naming patterns once, here, and hand back an explicit result.
        let caption_path = if want_captions {
            let found = find_caption_file(destination, &self.config.caption_language);
            if found.is_none() {
                debug!("No caption track deposited for {url}");
            }
            found
        } else {
            None
        };

        Ok(AcquiredMedia {
            media_path: destination.to_path_buf(),
            caption_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_metadata_full_payload() {
        let payload = r#"{
            "title": "A Video",
            "duration": 95.0,
            "uploader": "someone",
            "view_count": 1234,
            "subtitles": {"en": []},
            "automatic_captions": {}
        }"#;

        let meta = parse_metadata(payload).unwrap();
        assert_eq!(meta.title, "A Video");
        assert_eq!(meta.duration_secs, 95.0);
        assert_eq!(meta.uploader, "someone");
        assert_eq!(meta.view_count, 1234);
        assert!(meta.captions_available);
    }

    #[test]
    fn test_parse_metadata_defaults() {
        let meta = parse_metadata("{}").unwrap();
        assert_eq!(meta.title, "untitled");
        assert_eq!(meta.duration_secs, 0.0);
        assert_eq!(meta.uploader, "Unknown");
        assert!(!meta.captions_available);
    }

    #[test]
    fn test_parse_metadata_malformed() {
        let err = parse_metadata("not json at all").unwrap_err();
        assert!(err.to_string().contains("malformed metadata response"));
    }

    #[test]
    fn test_find_caption_file_prefers_language_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media.mp4");
        fs::write(dir.path().join("media.srt"), "x").unwrap();
        fs::write(dir.path().join("media.en.vtt"), "x").unwrap();

        let found = find_caption_file(&media, "en").unwrap();
        assert_eq!(found, dir.path().join("media.en.vtt"));
    }

    #[test]
    fn test_find_caption_file_untagged_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media.mp4");
        fs::write(dir.path().join("media.vtt"), "x").unwrap();

        let found = find_caption_file(&media, "en").unwrap();
        assert_eq!(found, dir.path().join("media.vtt"));
    }

    #[test]
    fn test_find_caption_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media.mp4");
        assert!(find_caption_file(&media, "en").is_none());
    }
}
