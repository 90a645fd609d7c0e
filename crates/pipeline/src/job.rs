//! Per-job processing pipeline
//!
//! A strictly sequential stage machine per input URL; no internal
//! concurrency, so a run needs no synchronization. Stage errors are folded
//! into the job's result at the boundary — `process_job` never fails. The
//! ephemeral workspace is a `TempDir`, removed on every exit path by Drop.

use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use video_snapshot_common::{JobResult, ProcessingConfig, Result};
use video_snapshot_dedup::{dedupe_with, DedupConfig};
use video_snapshot_document::{assemble, DocumentConfig};
use video_snapshot_fetcher::{MediaAcquirer, MetadataFetcher, YtDlp};
use video_snapshot_frames::{capture_sequence, Ffmpeg, FrameCapturer};
use video_snapshot_transcript::{write_transcript, TranscriptConfig};

/// Immutable input to one pipeline run, owned exclusively by that run
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// 1-based position in the input batch
    pub job_id: usize,
    pub url: String,
    pub config: ProcessingConfig,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    FetchMetadata,
    Acquire,
    CaptureFrames,
    Deduplicate,
    AssembleDocument,
    Finalize,
}

impl JobStage {
    /// Execution order of the stage machine
    pub const SEQUENCE: [JobStage; 6] = [
        JobStage::FetchMetadata,
        JobStage::Acquire,
        JobStage::CaptureFrames,
        JobStage::Deduplicate,
        JobStage::AssembleDocument,
        JobStage::Finalize,
    ];

    /// Human-readable stage name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchMetadata => "fetch_metadata",
            Self::Acquire => "acquire",
            Self::CaptureFrames => "capture_frames",
            Self::Deduplicate => "deduplicate",
            Self::AssembleDocument => "assemble_document",
            Self::Finalize => "finalize",
        }
    }
}

/// Collaborator bundle handed to every job
#[derive(Clone)]
pub struct Toolchain {
    pub fetcher: Arc<dyn MetadataFetcher>,
    pub acquirer: Arc<dyn MediaAcquirer>,
    pub capturer: Arc<dyn FrameCapturer>,
}

impl Toolchain {
    /// Collaborators backed by the real yt-dlp and ffmpeg binaries
    #[must_use]
    pub fn system() -> Self {
        let ytdlp = Arc::new(YtDlp::new());
        Self {
            fetcher: ytdlp.clone(),
            acquirer: ytdlp,
            capturer: Arc::new(Ffmpeg::new()),
        }
    }
}

/// Run one job end to end.
///
/// Every failure is captured into the returned result; elapsed wall time is
/// recorded from entry to exit regardless of outcome.
pub async fn process_job(spec: &JobSpec, tools: &Toolchain) -> JobResult {
    let started = Instant::now();
    let mut result = JobResult::started(spec.job_id, spec.url.clone());

    match run_stages(spec, tools, &mut result).await {
        Ok(()) => {
            result.success = true;
            info!("[Job {}] ✓ Completed: {}", spec.job_id, spec.url);
        }
        Err(e) => {
            warn!("[Job {}] ✗ {}: {e}", spec.job_id, spec.url);
            result.error = Some(e.to_string());
        }
    }

    result.elapsed = started.elapsed();
    result
}

async fn run_stages(spec: &JobSpec, tools: &Toolchain, result: &mut JobResult) -> Result<()> {
    let config: &ProcessingConfig = &spec.config;

    debug!(
        "[Job {}] Stage {}",
        spec.job_id,
        JobStage::FetchMetadata.name()
    );
    info!("[Job {}] Fetching metadata for {}", spec.job_id, spec.url);
    let metadata = tools.fetcher.fetch(&spec.url).await?;
    let title = metadata.sanitized_title();

    let video_dir = config.output_root.join(&title);
    let images_dir = video_dir.join("images");
    fs::create_dir_all(&images_dir)?;

    debug!("[Job {}] Stage {}", spec.job_id, JobStage::Acquire.name());
    info!("[Job {}] Acquiring media: {}", spec.job_id, metadata.title);
    let workspace = tempfile::tempdir()?;
    let media_destination = workspace.path().join("media.mp4");
    let want_captions = !config.skip_transcript;
    let acquired = tools
        .acquirer
        .acquire(&spec.url, &media_destination, want_captions)
        .await?;

    if let Some(caption_path) = &acquired.caption_path {
        let transcript_path = video_dir.join(format!("{title}_transcript.txt"));
        match write_transcript(caption_path, &transcript_path, &TranscriptConfig::default()) {
            Ok(()) => result.transcript_saved = true,
            // A broken caption file loses the transcript, not the job
            Err(e) => warn!("[Job {}] Transcript conversion failed: {e}", spec.job_id),
        }
    }

    debug!(
        "[Job {}] Stage {}",
        spec.job_id,
        JobStage::CaptureFrames.name()
    );
    info!("[Job {}] Extracting stills", spec.job_id);
    let artifacts = capture_sequence(
        tools.capturer.as_ref(),
        &acquired.media_path,
        &images_dir,
        &title,
        config.interval_secs,
        config.quality,
    )
    .await?;

    debug!(
        "[Job {}] Stage {}",
        spec.job_id,
        JobStage::Deduplicate.name()
    );
    let survivors = if config.skip_dedup {
        artifacts
    } else {
        let outcome = dedupe_with(artifacts, &DedupConfig::default())?;
        info!(
            "[Job {}] Removed {} duplicate captures",
            spec.job_id, outcome.removed
        );
        outcome.survivors
    };
    result.unique_captures = survivors.len();

    debug!(
        "[Job {}] Stage {}",
        spec.job_id,
        JobStage::AssembleDocument.name()
    );
    if !config.skip_document {
        let document_path = video_dir.join(format!("{title}_document.pdf"));
        let document_config = DocumentConfig {
            dpi: config.document_dpi,
            ..DocumentConfig::default()
        };
        // Assembly failure is downgraded: captures remain a valid deliverable
        match assemble(&survivors, &document_path, &document_config) {
            Ok(true) => result.document_created = true,
            Ok(false) => warn!(
                "[Job {}] Document not created: no readable captures",
                spec.job_id
            ),
            Err(e) => warn!("[Job {}] {e}", spec.job_id),
        }
    }

    debug!("[Job {}] Stage {}", spec.job_id, JobStage::Finalize.name());
    if config.keep_media {
        let extension = acquired
            .media_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        fs::copy(
            &acquired.media_path,
            video_dir.join(format!("{title}.{extension}")),
        )?;
    }

    Ok(())
}
