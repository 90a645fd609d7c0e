//! End-to-end pipeline and scheduler tests over mock collaborators
//!
//! The mocks write real image bytes so deduplication and document assembly
//! run for real against the filesystem; only the external tools are faked.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use video_snapshot_common::{
    sanitize, ProcessingConfig, ProcessingError, QualityTier, Result, VideoMetadata,
};
use video_snapshot_fetcher::{AcquiredMedia, MediaAcquirer, MetadataFetcher};
use video_snapshot_frames::FrameCapturer;
use video_snapshot_pipeline::{process_job, BatchScheduler, JobSpec, Toolchain};

const SRT_SAMPLE: &str = "1\n00:00:00,000 --> 00:00:02,000\nHello from the mock captions\n";

/// Metadata fetcher that fails for chosen URLs and can stall for others
struct MockFetcher {
    duration_secs: f64,
    fail_for: Vec<String>,
    stall_for: Vec<String>,
}

impl MockFetcher {
    fn ok(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            fail_for: Vec::new(),
            stall_for: Vec::new(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<VideoMetadata> {
        if self.stall_for.iter().any(|u| u == url) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_for.iter().any(|u| u == url) {
            return Err(ProcessingError::MetadataFetch(
                "unreachable or invalid URL: HTTP 404".to_string(),
            ));
        }

        let title = url.rsplit('/').next().unwrap_or("untitled").to_string();
        Ok(VideoMetadata {
            title,
            duration_secs: self.duration_secs,
            uploader: "mock".to_string(),
            view_count: 42,
            captions_available: true,
        })
    }
}

/// Acquirer that writes a placeholder media file and optionally a caption
struct MockAcquirer {
    deposit_captions: bool,
}

#[async_trait]
impl MediaAcquirer for MockAcquirer {
    async fn acquire(
        &self,
        _url: &str,
        destination: &Path,
        want_captions: bool,
    ) -> Result<AcquiredMedia> {
        std::fs::write(destination, b"mock media bytes")?;

        let caption_path = if want_captions && self.deposit_captions {
            let stem = destination.file_stem().unwrap().to_str().unwrap();
            let caption = destination.parent().unwrap().join(format!("{stem}.en.srt"));
            std::fs::write(&caption, SRT_SAMPLE)?;
            Some(caption)
        } else {
            None
        };

        Ok(AcquiredMedia {
            media_path: destination.to_path_buf(),
            caption_path,
        })
    }
}

/// Capturer that writes a real encoded image per timestamp.
///
/// Frames at the timestamps in `duplicate_of` reuse another timestamp's
/// pixel content, so their encoded bytes are identical.
struct MockCapturer {
    duration_secs: f64,
    duplicate_of: Vec<(u64, u64)>,
}

impl MockCapturer {
    fn shade_for(&self, timestamp: u64) -> u8 {
        let source = self
            .duplicate_of
            .iter()
            .find(|(later, _)| *later == timestamp)
            .map_or(timestamp, |(_, earlier)| *earlier);
        (source % 200) as u8
    }
}

#[async_trait]
impl FrameCapturer for MockCapturer {
    async fn probe_duration(&self, _media_path: &Path) -> Result<f64> {
        Ok(self.duration_secs)
    }

    async fn capture_frame(
        &self,
        _media_path: &Path,
        timestamp_secs: u64,
        output_path: &Path,
        _quality: QualityTier,
    ) -> Result<()> {
        let shade = self.shade_for(timestamp_secs);
        let img = image::RgbImage::from_pixel(16, 12, image::Rgb([shade, 0, 255 - shade]));
        img.save(output_path)?;
        Ok(())
    }
}

fn toolchain(fetcher: MockFetcher, capturer: MockCapturer) -> Toolchain {
    Toolchain {
        fetcher: Arc::new(fetcher),
        acquirer: Arc::new(MockAcquirer {
            deposit_captions: true,
        }),
        capturer: Arc::new(capturer),
    }
}

fn config(output_root: &Path) -> ProcessingConfig {
    ProcessingConfig {
        interval_secs: 10,
        output_root: output_root.to_path_buf(),
        ..ProcessingConfig::default()
    }
}

#[tokio::test]
async fn test_full_job_produces_bundle() {
    let out = tempfile::tempdir().unwrap();
    // 95s at a 10s interval: stills at 0..=90; captures at 30 and 70 are
    // byte-identical, so one is removed.
    let tools = toolchain(
        MockFetcher::ok(95.0),
        MockCapturer {
            duration_secs: 95.0,
            duplicate_of: vec![(70, 30)],
        },
    );

    let spec = JobSpec {
        job_id: 1,
        url: "https://example.com/watch/My Talk".to_string(),
        config: config(out.path()),
    };

    let result = process_job(&spec, &tools).await;
    assert!(result.success, "job failed: {:?}", result.error);
    assert_eq!(result.unique_captures, 9);
    assert!(result.document_created);
    assert!(result.transcript_saved);

    let title = sanitize::sanitize_title("My Talk");
    let video_dir = out.path().join(&title);

    let images: Vec<_> = std::fs::read_dir(video_dir.join("images"))
        .unwrap()
        .collect();
    assert_eq!(images.len(), 9);

    let document_path = video_dir.join(format!("{title}_document.pdf"));
    let document = lopdf::Document::load(&document_path).unwrap();
    assert_eq!(document.get_pages().len(), 9);

    let transcript = std::fs::read_to_string(video_dir.join(format!("{title}_transcript.txt")))
        .unwrap();
    assert!(transcript.contains("Hello from the mock captions"));
}

#[tokio::test]
async fn test_metadata_failure_fails_job_without_later_stages() {
    let out = tempfile::tempdir().unwrap();
    let url = "https://example.com/watch/broken".to_string();
    let tools = toolchain(
        MockFetcher {
            duration_secs: 95.0,
            fail_for: vec![url.clone()],
            stall_for: Vec::new(),
        },
        MockCapturer {
            duration_secs: 95.0,
            duplicate_of: Vec::new(),
        },
    );

    let spec = JobSpec {
        job_id: 1,
        url,
        config: config(out.path()),
    };

    let result = process_job(&spec, &tools).await;
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("metadata fetch failed"));
    assert_eq!(result.unique_captures, 0);
    // No output subtree was created for the failed job
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_batch_summary_accounts_for_every_url() {
    let out = tempfile::tempdir().unwrap();
    let urls = vec![
        "https://example.com/watch/one".to_string(),
        "https://example.com/watch/two".to_string(),
        "https://example.com/watch/three".to_string(),
    ];
    let tools = toolchain(
        MockFetcher {
            duration_secs: 30.0,
            fail_for: vec![urls[1].clone()],
            stall_for: Vec::new(),
        },
        MockCapturer {
            duration_secs: 30.0,
            duplicate_of: Vec::new(),
        },
    );

    let scheduler = BatchScheduler::new(tools).with_max_concurrent_jobs(2);
    let summary = scheduler.run_batch(&urls, &config(out.path())).await;

    assert_eq!(summary.total_jobs, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].job_id, 2);
    assert_eq!(summary.failures[0].url, urls[1]);
    assert!(summary.failures[0].error.contains("metadata fetch failed"));
}

#[tokio::test]
async fn test_timeout_does_not_block_siblings() {
    let out = tempfile::tempdir().unwrap();
    let urls = vec![
        "https://example.com/watch/fast-a".to_string(),
        "https://example.com/watch/stuck".to_string(),
        "https://example.com/watch/fast-b".to_string(),
    ];
    let tools = toolchain(
        MockFetcher {
            duration_secs: 20.0,
            fail_for: Vec::new(),
            stall_for: vec![urls[1].clone()],
        },
        MockCapturer {
            duration_secs: 20.0,
            duplicate_of: Vec::new(),
        },
    );

    let scheduler = BatchScheduler::new(tools)
        .with_max_concurrent_jobs(3)
        .with_job_timeout(Duration::from_secs(2));
    let summary = scheduler.run_batch(&urls, &config(out.path())).await;

    assert_eq!(summary.total_jobs, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].job_id, 2);
    assert!(summary.failures[0].error.contains("timed out"));
}

#[tokio::test]
async fn test_single_url_runs_inline_with_same_result_shape() {
    let out = tempfile::tempdir().unwrap();
    let urls = vec!["https://example.com/watch/solo".to_string()];
    let tools = toolchain(
        MockFetcher::ok(25.0),
        MockCapturer {
            duration_secs: 25.0,
            duplicate_of: Vec::new(),
        },
    );

    let scheduler = BatchScheduler::new(tools);
    let summary = scheduler.run_batch(&urls, &config(out.path())).await;

    assert_eq!(summary.total_jobs, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.total_unique_captures, 3);
}

#[tokio::test]
async fn test_skip_flags_disable_optional_outputs() {
    let out = tempfile::tempdir().unwrap();
    let tools = toolchain(
        MockFetcher::ok(20.0),
        MockCapturer {
            duration_secs: 20.0,
            duplicate_of: Vec::new(),
        },
    );

    let mut cfg = config(out.path());
    cfg.skip_document = true;
    cfg.skip_transcript = true;

    let spec = JobSpec {
        job_id: 1,
        url: "https://example.com/watch/plain".to_string(),
        config: cfg,
    };

    let result = process_job(&spec, &tools).await;
    assert!(result.success);
    assert!(!result.document_created);
    assert!(!result.transcript_saved);

    let title = sanitize::sanitize_title("plain");
    assert!(!out
        .path()
        .join(&title)
        .join(format!("{title}_document.pdf"))
        .exists());
}

#[tokio::test]
async fn test_no_dedup_keeps_byte_identical_captures() {
    let out = tempfile::tempdir().unwrap();
    let tools = toolchain(
        MockFetcher::ok(95.0),
        MockCapturer {
            duration_secs: 95.0,
            duplicate_of: vec![(70, 30)],
        },
    );

    let mut cfg = config(out.path());
    cfg.skip_dedup = true;

    let spec = JobSpec {
        job_id: 1,
        url: "https://example.com/watch/alldupes".to_string(),
        config: cfg,
    };

    let result = process_job(&spec, &tools).await;
    assert!(result.success);
    assert_eq!(result.unique_captures, 10);
}

#[tokio::test]
async fn test_keep_media_copies_source_into_output_tree() {
    let out = tempfile::tempdir().unwrap();
    let tools = toolchain(
        MockFetcher::ok(15.0),
        MockCapturer {
            duration_secs: 15.0,
            duplicate_of: Vec::new(),
        },
    );

    let mut cfg = config(out.path());
    cfg.keep_media = true;

    let spec = JobSpec {
        job_id: 1,
        url: "https://example.com/watch/keeper".to_string(),
        config: cfg,
    };

    let result = process_job(&spec, &tools).await;
    assert!(result.success);

    let title = sanitize::sanitize_title("keeper");
    let retained = out.path().join(&title).join(format!("{title}.mp4"));
    assert_eq!(std::fs::read(retained).unwrap(), b"mock media bytes");
}
