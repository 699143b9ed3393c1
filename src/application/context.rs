//! Application context: the queue / processor / cache triad, built once at
//! startup and torn down explicitly. No ambient module-level state.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::{BearsRepo, BearsWriteRepo, ColorsRepo, ColorsWriteRepo};
use crate::cache::MemoryCache;
use crate::queue::processor::{ProcessorHandle, QueueProcessor};
use crate::queue::{JobKind, JobQueue, JobTicket};

pub struct AppContext {
    queue: Arc<JobQueue>,
    cache: Arc<MemoryCache>,
    processor: ProcessorHandle,
}

impl AppContext {
    /// Build the triad, populate the initial snapshot with a full store
    /// scan, and start the processor loop.
    pub async fn initialize(
        bears: Arc<dyn BearsRepo>,
        colors: Arc<dyn ColorsRepo>,
        bears_write: Arc<dyn BearsWriteRepo>,
        colors_write: Arc<dyn ColorsWriteRepo>,
        tick: Duration,
    ) -> Result<Self, AppError> {
        let queue = Arc::new(JobQueue::new());
        let cache = Arc::new(MemoryCache::new(bears, colors));

        cache.rebuild().await?;
        info!(stats = ?cache.stats(), "initial snapshot built");

        let processor = Arc::new(QueueProcessor::new(
            queue.clone(),
            bears_write,
            colors_write,
            cache.clone(),
        ))
        .spawn(tick);

        Ok(Self {
            queue,
            cache,
            processor,
        })
    }

    /// Enqueue a mutation; the returned ticket resolves once the processor
    /// has applied or discarded it.
    pub fn submit(&self, kind: JobKind) -> JobTicket {
        self.queue.submit(kind)
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    /// Stop the processor and abandon pending jobs.
    pub async fn shutdown(self) {
        self.processor.shutdown().await;
        info!("application context shut down");
    }
}
