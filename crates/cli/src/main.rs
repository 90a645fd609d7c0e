//! video-snapshot — batch video frame-capture tool
//!
//! Turns a list of video URLs into per-video bundles of deduplicated frame
//! captures, an assembled PDF document, an optional transcript, and an
//! optionally retained media file.

use anyhow::{bail, Context as _, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use video_snapshot_common::{format_duration, BatchSummary, ProcessingConfig, QualityTier};
use video_snapshot_pipeline::{BatchScheduler, Toolchain};

mod input;
mod preflight;

/// Capture quality tier as exposed on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    /// Lossy JPEG stills
    High,
    /// Lossless PNG stills
    Lossless,
}

impl From<QualityArg> for QualityTier {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::High => QualityTier::High,
            QualityArg::Lossless => QualityTier::Lossless,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "video-snapshot",
    version,
    about = "Batch video frame capture: deduplicated stills, PDF documents, transcripts",
    group(ArgGroup::new("source").required(true).args(["url", "batch"]))
)]
struct Cli {
    /// Single video URL
    #[arg(long)]
    url: Option<String>,

    /// File with one URL per line; blank lines and # comments are ignored
    #[arg(long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Seconds between captures
    #[arg(long)]
    interval: u64,

    /// Base directory for output
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Capture quality tier
    #[arg(long, value_enum, default_value_t = QualityArg::High)]
    quality: QualityArg,

    /// Resolution metadata for the assembled document
    #[arg(long, default_value_t = 300)]
    document_dpi: u32,

    /// Keep the downloaded media files
    #[arg(long)]
    keep_media: bool,

    /// Skip transcript retrieval
    #[arg(long)]
    no_transcript: bool,

    /// Skip document assembly
    #[arg(long)]
    no_document: bool,

    /// Leave byte-identical captures in place
    #[arg(long)]
    no_dedup: bool,

    /// Number of parallel workers (default: available cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Per-job ceiling in seconds
    #[arg(long, default_value_t = 600)]
    job_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if cli.interval == 0 {
        bail!("--interval must be greater than 0");
    }

    preflight::check_dependencies()?;

    let urls = match (&cli.url, &cli.batch) {
        (Some(url), None) => vec![url.clone()],
        (None, Some(path)) => {
            let urls = input::read_urls(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if urls.is_empty() {
                bail!("no usable URLs in {}", path.display());
            }
            urls
        }
        _ => unreachable!("clap enforces exactly one input source"),
    };

    let config = ProcessingConfig {
        interval_secs: cli.interval,
        output_root: cli.output_dir.clone(),
        quality: cli.quality.into(),
        document_dpi: cli.document_dpi,
        keep_media: cli.keep_media,
        skip_transcript: cli.no_transcript,
        skip_document: cli.no_document,
        skip_dedup: cli.no_dedup,
    };

    info!("=== Video Snapshot Batch ===");
    info!("Videos to process: {}", urls.len());
    info!("Interval: {}s", cli.interval);

    let mut scheduler = BatchScheduler::new(Toolchain::system())
        .with_job_timeout(Duration::from_secs(cli.job_timeout));
    if let Some(workers) = cli.workers {
        scheduler = scheduler.with_max_concurrent_jobs(workers);
    }

    let summary = scheduler.run_batch(&urls, &config).await;
    print_summary(&summary);

    // A failed sole job fails the process; multi-job batches report their
    // failures in the summary and still exit clean.
    if summary.total_jobs == 1 && summary.failed > 0 {
        bail!("job failed: {}", summary.failures[0].error);
    }

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    info!("=== Batch Processing Complete ===");
    info!("Total videos: {}", summary.total_jobs);
    info!("Successful: {}", summary.succeeded);
    info!("Failed: {}", summary.failed);
    info!("Unique captures: {}", summary.total_unique_captures);
    info!("Total time: {}", format_duration(summary.total_elapsed));
    info!(
        "Average time per video: {}",
        format_duration(summary.mean_job_elapsed)
    );

    if !summary.failures.is_empty() {
        info!("Failed videos:");
        for failure in &summary.failures {
            info!(
                "  - Job {}: {} - {}",
                failure.job_id, failure.url, failure.error
            );
        }
    }
}
