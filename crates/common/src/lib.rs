/// Common types and utilities shared across the snapshot workspace
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod sanitize;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("required tool not found: {0}")]
    DependencyMissing(String),

    #[error("metadata fetch failed: {0}")]
    MetadataFetch(String),

    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("document not created: {0}")]
    DocumentAssembly(String),

    #[error("job timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(String),

    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::Image(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Still-capture quality tier, configured once per batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Lossy JPEG stills
    High,
    /// Lossless PNG stills
    Lossless,
}

impl QualityTier {
    /// File extension used for captures at this tier
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::High => "jpg",
            Self::Lossless => "png",
        }
    }
}

/// Shared processing configuration for every job in a batch
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Seconds between capture timestamps
    pub interval_secs: u64,
    /// Root directory under which each job gets its own subtree
    pub output_root: PathBuf,
    /// Capture quality tier
    pub quality: QualityTier,
    /// Resolution metadata embedded in the assembled document
    pub document_dpi: u32,
    /// Copy the source media into the output tree after processing
    pub keep_media: bool,
    /// Skip caption retrieval and transcript conversion
    pub skip_transcript: bool,
    /// Skip document assembly
    pub skip_document: bool,
    /// Leave byte-identical captures in place
    pub skip_dedup: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            output_root: PathBuf::from("."),
            quality: QualityTier::High,
            document_dpi: 300,
            keep_media: false,
            skip_transcript: false,
            skip_document: false,
            skip_dedup: false,
        }
    }
}

/// Metadata record returned by the fetch collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub duration_secs: f64,
    pub uploader: String,
    pub view_count: u64,
    pub captions_available: bool,
}

impl VideoMetadata {
    /// Title reduced to a valid path segment
    #[must_use]
    pub fn sanitized_title(&self) -> String {
        sanitize::sanitize_title(&self.title)
    }
}

/// One extracted still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    pub path: PathBuf,
    /// Seconds from the start of the media; strictly increasing per job
    pub timestamp_secs: u64,
    pub quality: QualityTier,
}

/// Outcome of one job, populated as stages complete and frozen at job exit
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: usize,
    pub url: String,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
    pub unique_captures: usize,
    pub document_created: bool,
    pub transcript_saved: bool,
}

impl JobResult {
    /// Fresh accumulator for a job that is about to run
    #[must_use]
    pub fn started(job_id: usize, url: impl Into<String>) -> Self {
        Self {
            job_id,
            url: url.into(),
            success: false,
            error: None,
            elapsed: Duration::ZERO,
            unique_captures: 0,
            document_created: false,
            transcript_saved: false,
        }
    }

    /// Failed result for a job that exceeded the scheduler's ceiling
    #[must_use]
    pub fn timed_out(job_id: usize, url: impl Into<String>, ceiling: Duration) -> Self {
        let mut result = Self::started(job_id, url);
        result.error = Some(ProcessingError::Timeout(ceiling.as_secs()).to_string());
        result.elapsed = ceiling;
        result
    }
}

/// One failed job as reported in the batch summary
#[derive(Debug, Clone)]
pub struct FailedJob {
    pub job_id: usize,
    pub url: String,
    pub error: String,
}

/// Aggregate over every job in a batch
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_unique_captures: usize,
    pub total_elapsed: Duration,
    pub mean_job_elapsed: Duration,
    pub failures: Vec<FailedJob>,
}

impl BatchSummary {
    /// Compute the aggregate once all results are in
    #[must_use]
    pub fn from_results(results: &[JobResult], total_elapsed: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failures: Vec<FailedJob> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| FailedJob {
                job_id: r.job_id,
                url: r.url.clone(),
                error: r
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect();
        let mean_job_elapsed = if results.is_empty() {
            Duration::ZERO
        } else {
            total_elapsed / results.len() as u32
        };

        Self {
            total_jobs: results.len(),
            succeeded,
            failed: failures.len(),
            total_unique_captures: results.iter().map(|r| r.unique_captures).sum(),
            total_elapsed,
            mean_job_elapsed,
            failures,
        }
    }
}

/// Humanize a wall-time span for summary output
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}
