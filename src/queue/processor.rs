//! Queue processor: the single writer.
//!
//! A recurring tick drains the queue one job at a time, applies the job to
//! the persistent store, and on success rebuilds the read snapshot from
//! scratch. A `tokio::sync::Mutex` makes the one-job-at-a-time rule hold
//! under real concurrency: a tick that finds the guard taken is a no-op,
//! and the guard is released on every exit path by RAII.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::application::repos::{BearsWriteRepo, ColorsWriteRepo, CreateBearParams, RepoError};
use crate::cache::MemoryCache;

use super::{JobKind, JobOutcome, JobQueue, QueuedJob};

const METRIC_JOBS_APPLIED: &str = "orso_jobs_applied_total";
const METRIC_JOBS_FAILED: &str = "orso_jobs_failed_total";
const METRIC_JOB_APPLY_MS: &str = "orso_job_apply_ms";

pub struct QueueProcessor {
    queue: Arc<JobQueue>,
    bears: Arc<dyn BearsWriteRepo>,
    colors: Arc<dyn ColorsWriteRepo>,
    cache: Arc<MemoryCache>,
    in_flight: tokio::sync::Mutex<()>,
}

impl QueueProcessor {
    pub fn new(
        queue: Arc<JobQueue>,
        bears: Arc<dyn BearsWriteRepo>,
        colors: Arc<dyn ColorsWriteRepo>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            queue,
            bears,
            colors,
            cache,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// One drain attempt: skip if a previous attempt is still running or the
    /// queue is empty, otherwise apply exactly one job.
    ///
    /// Returns true when a job was processed (regardless of its outcome).
    #[instrument(skip(self))]
    pub async fn tick(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return false;
        };
        let Some(queued) = self.queue.take() else {
            return false;
        };
        self.process(queued).await;
        true
    }

    async fn process(&self, queued: QueuedJob) {
        let QueuedJob { job, completion } = queued;
        let started_at = Instant::now();

        info!(
            job_id = %job.id,
            job_seq = job.seq,
            kind = job.kind.name(),
            "processing job"
        );

        let outcome = match self.apply(&job.kind).await {
            Ok(()) => {
                counter!(METRIC_JOBS_APPLIED).increment(1);
                // The mutation is durable even when the rebuild is not; the
                // snapshot stays at its last consistent state until the next
                // successful rebuild.
                if let Err(err) = self.cache.rebuild().await {
                    warn!(
                        job_id = %job.id,
                        error = %err,
                        "cache rebuild failed after applied job; snapshot is stale"
                    );
                }
                info!(
                    job_id = %job.id,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "job applied"
                );
                JobOutcome::Applied
            }
            Err(err) => {
                counter!(METRIC_JOBS_FAILED).increment(1);
                error!(
                    job_id = %job.id,
                    kind = job.kind.name(),
                    error = %err,
                    "job failed; discarding without retry"
                );
                JobOutcome::Failed(err.to_string())
            }
        };

        histogram!(METRIC_JOB_APPLY_MS, "kind" => job.kind.name())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        // The submitter may have dropped its ticket; that is fine.
        let _ = completion.send(outcome);
    }

    async fn apply(&self, kind: &JobKind) -> Result<(), RepoError> {
        match kind {
            JobKind::CreateBear { name, size, colors } => self
                .bears
                .create_bear(CreateBearParams {
                    name: name.clone(),
                    size: *size,
                    colors: colors.clone(),
                })
                .await
                .map(|_| ()),
            JobKind::RenameBear { id, name } => self.bears.rename_bear(*id, name).await,
            JobKind::ResizeBear { id, size } => self.bears.resize_bear(*id, *size).await,
            JobKind::ReplaceBearColors { id, colors } => {
                self.bears.replace_bear_colors(*id, colors).await
            }
            JobKind::DeleteBear { id } => self.bears.delete_bear(*id).await,
            JobKind::CreateColor { name, hex } => {
                self.colors.create_color(name, hex).await.map(|_| ())
            }
            JobKind::DeleteColor { name } => self.colors.delete_color(name).await,
        }
    }

    /// Run the recurring tick loop on a background task until the returned
    /// handle is shut down.
    pub fn spawn(self: Arc<Self>, period: Duration) -> ProcessorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let queue = self.queue.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        ProcessorHandle {
            shutdown,
            task,
            queue,
        }
    }
}

/// Handle to a spawned processor loop.
pub struct ProcessorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    queue: Arc<JobQueue>,
}

impl ProcessorHandle {
    /// Stop the loop, wait for it, and abandon whatever is still queued.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
        let pending = self.queue.len();
        if pending > 0 {
            warn!(pending, "abandoning queued jobs on shutdown");
        }
        self.queue.clear();
    }
}
