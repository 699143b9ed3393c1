//! Mutation job queue.
//!
//! Every write to the catalog is expressed as a [`Job`] and appended here;
//! the [`QueueProcessor`](processor::QueueProcessor) drains the queue one
//! job per tick, strictly in submission order. Submitters get a
//! [`JobTicket`] whose [`outcome`](JobTicket::outcome) future resolves once
//! the job has been applied, has failed, or was abandoned — no caller ever
//! has to guess whether a write went through.
//!
//! The queue is unbounded and does no deduplication or prioritization.

pub mod processor;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::util::lock::mutex_lock;

const SOURCE: &str = "queue";

const METRIC_QUEUE_DEPTH: &str = "orso_queue_depth";
const METRIC_JOBS_SUBMITTED: &str = "orso_jobs_submitted_total";

/// One intended mutation, dispatched by the processor to the write
/// repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    CreateBear {
        name: String,
        size: i64,
        colors: Vec<String>,
    },
    RenameBear {
        id: i64,
        name: String,
    },
    ResizeBear {
        id: i64,
        size: i64,
    },
    ReplaceBearColors {
        id: i64,
        colors: Vec<String>,
    },
    DeleteBear {
        id: i64,
    },
    CreateColor {
        name: String,
        hex: String,
    },
    DeleteColor {
        name: String,
    },
}

impl JobKind {
    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::CreateBear { .. } => "create_bear",
            JobKind::RenameBear { .. } => "rename_bear",
            JobKind::ResizeBear { .. } => "resize_bear",
            JobKind::ReplaceBearColors { .. } => "replace_bear_colors",
            JobKind::DeleteBear { .. } => "delete_bear",
            JobKind::CreateColor { .. } => "create_color",
            JobKind::DeleteColor { .. } => "delete_color",
        }
    }
}

/// An immutable job descriptor.
///
/// `seq` is a process-local monotonic counter; it is the queue's ordering
/// authority. `id` exists for log correlation only.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub seq: u64,
    pub kind: JobKind,
    pub created_at: OffsetDateTime,
}

/// Terminal state of a submitted job, delivered through its [`JobTicket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The store mutation succeeded.
    Applied,
    /// The store mutation failed; the job was discarded without retry.
    Failed(String),
    /// The queue shut down (or dropped the job) before it was applied.
    Abandoned,
}

/// Handed to the submitter: the job descriptor plus a completion channel.
#[derive(Debug)]
pub struct JobTicket {
    pub job: Job,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
    /// Wait for the job's terminal state. Resolves [`JobOutcome::Abandoned`]
    /// when the processor goes away without reporting.
    pub async fn outcome(self) -> JobOutcome {
        self.outcome.await.unwrap_or(JobOutcome::Abandoned)
    }
}

/// A job coupled with the sender half of its completion channel; what the
/// processor takes off the queue.
#[derive(Debug)]
pub struct QueuedJob {
    pub job: Job,
    pub completion: oneshot::Sender<JobOutcome>,
}

/// In-memory FIFO queue: any number of concurrent submitters, one consumer.
///
/// A mutex keeps the structure safe under concurrent appends; contention is
/// expected to be low.
pub struct JobQueue {
    queue: Mutex<VecDeque<QueuedJob>>,
    seq_counter: AtomicU64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            seq_counter: AtomicU64::new(0),
        }
    }

    /// Append a job to the tail. Never blocks, never rejects.
    pub fn submit(&self, kind: JobKind) -> JobTicket {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            id: Uuid::new_v4(),
            seq,
            kind,
            created_at: OffsetDateTime::now_utc(),
        };
        let (completion, outcome) = oneshot::channel();

        debug!(
            job_id = %job.id,
            job_seq = job.seq,
            kind = job.kind.name(),
            "job submitted"
        );

        let depth = {
            let mut queue = mutex_lock(&self.queue, SOURCE, "submit");
            queue.push_back(QueuedJob {
                job: job.clone(),
                completion,
            });
            queue.len()
        };
        counter!(METRIC_JOBS_SUBMITTED).increment(1);
        gauge!(METRIC_QUEUE_DEPTH).set(depth as f64);

        JobTicket { job, outcome }
    }

    /// Remove and return the head job, FIFO.
    pub fn take(&self) -> Option<QueuedJob> {
        let (taken, depth) = {
            let mut queue = mutex_lock(&self.queue, SOURCE, "take");
            let taken = queue.pop_front();
            (taken, queue.len())
        };
        gauge!(METRIC_QUEUE_DEPTH).set(depth as f64);

        if let Some(queued) = &taken {
            debug!(job_id = %queued.job.id, job_seq = queued.job.seq, "job taken");
        }
        taken
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending jobs; their tickets resolve `Abandoned`.
    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_QUEUE_DEPTH).set(0.0);
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
