//! The immutable composite snapshot and its query methods.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::domain::entities::{BearRecord, ColorRecord};

/// Point-in-time view of the whole catalog.
///
/// The four structures are always built together from one store scan:
/// a partially updated snapshot cannot exist. `bears_by_size` and `by_id`
/// hold exactly the same id set, and every bear id in `color_index`
/// resolves through `by_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// All bears ascending by `(size, id)`; the id tiebreak keeps rebuild
    /// output deterministic.
    bears_by_size: Vec<BearRecord>,
    /// Bear id → index into `bears_by_size`.
    by_id: HashMap<i64, usize>,
    /// Color id → ids of the bears carrying that color.
    color_index: HashMap<i64, BTreeSet<i64>>,
    /// Full color list at rebuild time.
    colors: Vec<ColorRecord>,
}

/// Observability counts; not load-bearing for correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub bears: usize,
    pub colors: usize,
    /// Distinct bears carrying at least one color.
    pub tagged_bears: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new())
    }

    /// Assemble a snapshot from one store scan.
    pub fn build(mut bears: Vec<BearRecord>, colors: Vec<ColorRecord>) -> Self {
        bears.sort_by(|a, b| (a.size, a.id).cmp(&(b.size, b.id)));

        let by_id = bears
            .iter()
            .enumerate()
            .map(|(index, bear)| (bear.id, index))
            .collect();

        let mut color_index: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        for bear in &bears {
            for color_id in &bear.color_ids {
                color_index.entry(*color_id).or_default().insert(bear.id);
            }
        }

        Self {
            bears_by_size: bears,
            by_id,
            color_index,
            colors,
        }
    }

    /// Bears with `start <= size <= end`, ascending by size.
    ///
    /// Lower bound by binary search, then a forward scan that stops at the
    /// first bear past `end`: O(log n + k).
    pub fn bears_in_size_range(&self, start: i64, end: i64) -> Vec<BearRecord> {
        let from = self.bears_by_size.partition_point(|bear| bear.size < start);
        self.bears_by_size[from..]
            .iter()
            .take_while(|bear| bear.size <= end)
            .cloned()
            .collect()
    }

    /// Bears carrying any of the given colors.
    ///
    /// An empty `color_ids` is the wildcard and returns the entire catalog,
    /// not an empty set. The non-wildcard path has set semantics: no
    /// ordering guarantee.
    pub fn bears_with_colors(&self, color_ids: &[i64]) -> Vec<BearRecord> {
        if color_ids.is_empty() {
            return self.bears_by_size.clone();
        }

        let mut matched: BTreeSet<i64> = BTreeSet::new();
        for color_id in color_ids {
            if let Some(bear_ids) = self.color_index.get(color_id) {
                matched.extend(bear_ids.iter().copied());
            }
        }

        matched
            .iter()
            .filter_map(|bear_id| {
                self.by_id
                    .get(bear_id)
                    .map(|&index| self.bears_by_size[index].clone())
            })
            .collect()
    }

    /// Color filter first, then the inclusive size window.
    pub fn bears_with_colors_in_range(
        &self,
        color_ids: &[i64],
        start: i64,
        end: i64,
    ) -> Vec<BearRecord> {
        self.bears_with_colors(color_ids)
            .into_iter()
            .filter(|bear| bear.size >= start && bear.size <= end)
            .collect()
    }

    /// The color list as of the last rebuild, verbatim.
    pub fn all_colors(&self) -> &[ColorRecord] {
        &self.colors
    }

    pub fn stats(&self) -> CacheStats {
        let tagged_bears = self
            .color_index
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len();
        CacheStats {
            bears: self.bears_by_size.len(),
            colors: self.colors.len(),
            tagged_bears,
        }
    }

    pub fn len(&self) -> usize {
        self.bears_by_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bears_by_size.is_empty()
    }
}
