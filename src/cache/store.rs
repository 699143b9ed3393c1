//! Snapshot holder and rebuild path.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, instrument};

use crate::application::repos::{BearsRepo, ColorsRepo, RepoError};
use crate::domain::entities::{BearRecord, ColorRecord};
use crate::util::lock::{rw_read, rw_write};

use super::snapshot::{CacheStats, Snapshot};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_REBUILD_MS: &str = "orso_cache_rebuild_ms";

/// The process-wide read cache.
///
/// Holds the current [`Snapshot`] behind an atomically swapped `Arc`; the
/// read repositories are only touched by [`rebuild`](MemoryCache::rebuild),
/// which the queue processor invokes after each applied mutation (and the
/// application context once at startup).
pub struct MemoryCache {
    bears_repo: Arc<dyn BearsRepo>,
    colors_repo: Arc<dyn ColorsRepo>,
    current: RwLock<Arc<Snapshot>>,
}

impl MemoryCache {
    /// Create a cache with an empty snapshot; call
    /// [`rebuild`](MemoryCache::rebuild) to populate it.
    pub fn new(bears_repo: Arc<dyn BearsRepo>, colors_repo: Arc<dyn ColorsRepo>) -> Self {
        Self {
            bears_repo,
            colors_repo,
            current: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    /// Scan the store and replace the whole snapshot in one swap.
    ///
    /// On error the previous snapshot stays in place untouched.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<(), RepoError> {
        let started_at = Instant::now();

        let bears = self.bears_repo.list_bears_in_range(0, i64::MAX).await?;
        let colors = self.colors_repo.list_all_colors().await?;
        let snapshot = Arc::new(Snapshot::build(bears, colors));
        let stats = snapshot.stats();

        *rw_write(&self.current, SOURCE, "rebuild") = snapshot;

        debug!(
            bears = stats.bears,
            colors = stats.colors,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "cache rebuilt"
        );
        histogram!(METRIC_CACHE_REBUILD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        Ok(())
    }

    /// Clone the current snapshot handle; the returned view stays consistent
    /// for as long as the caller holds it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        rw_read(&self.current, SOURCE, "snapshot").clone()
    }

    pub fn bears_in_size_range(&self, start: i64, end: i64) -> Vec<BearRecord> {
        self.snapshot().bears_in_size_range(start, end)
    }

    pub fn bears_with_colors(&self, color_ids: &[i64]) -> Vec<BearRecord> {
        self.snapshot().bears_with_colors(color_ids)
    }

    pub fn bears_with_colors_in_range(
        &self,
        color_ids: &[i64],
        start: i64,
        end: i64,
    ) -> Vec<BearRecord> {
        self.snapshot()
            .bears_with_colors_in_range(color_ids, start, end)
    }

    pub fn all_colors(&self) -> Vec<ColorRecord> {
        self.snapshot().all_colors().to_vec()
    }

    pub fn stats(&self) -> CacheStats {
        self.snapshot().stats()
    }
}
