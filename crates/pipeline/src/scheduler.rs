//! Batch scheduler
//!
//! Fans one pipeline run per URL across a bounded worker pool, enforces a
//! per-job wall-clock ceiling, streams results back in completion order,
//! and aggregates a summary that accounts for every input exactly once.
//! One job's failure or timeout never cancels its siblings.

use crate::job::{process_job, JobSpec, Toolchain};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use video_snapshot_common::{BatchSummary, JobResult, ProcessingConfig};

/// Generous ceiling on a single job, bounding one stuck external tool
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Bounded-pool batch orchestrator
pub struct BatchScheduler {
    tools: Arc<Toolchain>,
    max_concurrent_jobs: usize,
    job_timeout: Duration,
}

impl BatchScheduler {
    /// Scheduler with the default pool width (available hardware
    /// concurrency) and job ceiling
    #[must_use]
    pub fn new(tools: Toolchain) -> Self {
        Self {
            tools: Arc::new(tools),
            max_concurrent_jobs: num_cpus::get(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    /// Override the pool width
    #[must_use]
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// Override the per-job wall-clock ceiling
    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Process every URL and return the aggregate summary.
    ///
    /// Jobs start as pool slots free up; results arrive in completion
    /// order and are re-indexed by job id for the summary.
    pub async fn run_batch(&self, urls: &[String], config: &ProcessingConfig) -> BatchSummary {
        let started = Instant::now();

        if urls.is_empty() {
            return BatchSummary::from_results(&[], started.elapsed());
        }

        // Nothing to schedule for one URL; run the pipeline inline
        if urls.len() == 1 {
            let spec = JobSpec {
                job_id: 1,
                url: urls[0].clone(),
                config: config.clone(),
            };
            let result = run_job_bounded(&self.tools, spec, self.job_timeout).await;
            return BatchSummary::from_results(&[result], started.elapsed());
        }

        let workers = self.max_concurrent_jobs.min(urls.len());
        info!(
            "Starting batch of {} jobs across {} workers",
            urls.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let spec = JobSpec {
                job_id: index + 1,
                url: url.clone(),
                config: config.clone(),
            };
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let tools = self.tools.clone();
            let job_timeout = self.job_timeout;

            tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = run_job_bounded(&tools, spec, job_timeout).await;
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let total = urls.len();
        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            let completed = results.len() + 1;
            let marker = if result.success { "✓" } else { "✗" };
            info!(
                "{marker} [Job {}] Progress: {completed}/{total} ({:.1}%)",
                result.job_id,
                completed as f64 / total as f64 * 100.0
            );
            results.push(result);
        }

        // A worker that died without reporting still owes the summary a row
        if results.len() < total {
            let reported: HashSet<usize> = results.iter().map(|r| r.job_id).collect();
            for (index, url) in urls.iter().enumerate() {
                let job_id = index + 1;
                if !reported.contains(&job_id) {
                    error!("Job {job_id} vanished without reporting a result");
                    let mut result = JobResult::started(job_id, url.clone());
                    result.error = Some("job worker terminated unexpectedly".to_string());
                    results.push(result);
                }
            }
        }

        // Completion order is arbitrary; the summary reads in job order
        results.sort_by_key(|r| r.job_id);
        BatchSummary::from_results(&results, started.elapsed())
    }
}

/// Run one job under the scheduler's wall-clock ceiling.
///
/// On expiry the job future is dropped, which terminates any in-flight
/// collaborator subprocess (children are spawned with `kill_on_drop`), and
/// a failed result is synthesized in its place. Siblings are unaffected.
async fn run_job_bounded(tools: &Toolchain, spec: JobSpec, ceiling: Duration) -> JobResult {
    match tokio::time::timeout(ceiling, process_job(&spec, tools)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "[Job {}] Timed out after {}s",
                spec.job_id,
                ceiling.as_secs()
            );
            JobResult::timed_out(spec.job_id, spec.url, ceiling)
        }
    }
}
