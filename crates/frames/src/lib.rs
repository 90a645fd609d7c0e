//! Frame capture stage
//!
//! Drives `ffprobe` for the media duration and `ffmpeg` for one still per
//! grid timestamp. The collaborator sits behind a trait so the pipeline can
//! run against a fake without either tool installed.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;
use video_snapshot_common::{CaptureArtifact, ProcessingError, QualityTier, Result};

/// Collaborator that probes duration and extracts single stills
#[async_trait]
pub trait FrameCapturer: Send + Sync {
    /// Total duration of the media file, in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Write one still image taken at `timestamp_secs` to `output_path`
    async fn capture_frame(
        &self,
        media_path: &Path,
        timestamp_secs: u64,
        output_path: &Path,
        quality: QualityTier,
    ) -> Result<()>;
}

/// Timestamps `0, I, 2I, …` up to and including the last multiple ≤ duration.
///
/// The grid always contains `floor(duration / interval) + 1` entries, so even
/// a zero-length media yields the frame at `0`.
#[must_use]
pub fn capture_grid(duration_secs: f64, interval_secs: u64) -> Vec<u64> {
    debug_assert!(interval_secs > 0);
    let last = if duration_secs <= 0.0 {
        0
    } else {
        duration_secs as u64 / interval_secs
    };
    (0..=last).map(|step| step * interval_secs).collect()
}

/// Capture one still per grid timestamp into `images_dir`.
///
/// Files are named `<title>_<ssss>s.<ext>`; ascending timestamp order equals
/// filename order. Any single extraction failure aborts the whole sequence —
/// partial capture sets are never returned.
pub async fn capture_sequence(
    capturer: &dyn FrameCapturer,
    media_path: &Path,
    images_dir: &Path,
    title: &str,
    interval_secs: u64,
    quality: QualityTier,
) -> Result<Vec<CaptureArtifact>> {
    let duration = capturer.probe_duration(media_path).await?;
    let grid = capture_grid(duration, interval_secs);
    debug!(
        "Capturing {} stills over {:.1}s of media",
        grid.len(),
        duration
    );

    let mut artifacts = Vec::with_capacity(grid.len());
    for timestamp in grid {
        let filename = format!("{title}_{timestamp:04}s.{}", quality.extension());
        let output_path = images_dir.join(filename);
        capturer
            .capture_frame(media_path, timestamp, &output_path, quality)
            .await?;
        artifacts.push(CaptureArtifact {
            path: output_path,
            timestamp_secs: timestamp,
            quality,
        });
    }

    Ok(artifacts)
}

/// ffmpeg/ffprobe invocation settings
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_binary: String,
    pub ffprobe_binary: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
        }
    }
}

/// Real collaborator backed by the ffmpeg CLI tools
pub struct Ffmpeg {
    config: FfmpegConfig,
}

impl Ffmpeg {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FfmpegConfig::default())
    }

    #[must_use]
    pub fn with_config(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameCapturer for Ffmpeg {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let output = Command::new(&self.config.ffprobe_binary)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ProcessingError::Capture(format!(
                    "failed to run {}: {e}",
                    self.config.ffprobe_binary
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::Capture(format!(
                "duration probe failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<f64>().map_err(|_| {
            ProcessingError::Capture(format!("unparseable duration: {:?}", stdout.trim()))
        })
    }

    async fn capture_frame(
        &self,
        media_path: &Path,
        timestamp_secs: u64,
        output_path: &Path,
        quality: QualityTier,
    ) -> Result<()> {
        let mut command = Command::new(&self.config.ffmpeg_binary);
        command
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(timestamp_secs.to_string())
            .arg("-i")
            .arg(media_path)
            .args(["-vframes", "1"]);

        // The lossy tier asks for the highest JPEG quality; PNG needs no flag
        if quality == QualityTier::High {
            command.args(["-q:v", "2"]);
        }

        command.arg("-y").arg(output_path).kill_on_drop(true);

        let output = command.output().await.map_err(|e| {
            ProcessingError::Capture(format!("failed to run {}: {e}", self.config.ffmpeg_binary))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::Capture(format!(
                "extraction at {timestamp_secs}s failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}
