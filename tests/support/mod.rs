//! In-memory implementation of the repository traits for the integration
//! suites, with enough instrumentation to assert ordering and mutual
//! exclusion from the outside.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use orso::application::repos::{
    BearsRepo, BearsWriteRepo, ColorsRepo, ColorsWriteRepo, CreateBearParams, RepoError,
};
use orso::domain::colors::{normalize_name, normalize_names};
use orso::domain::entities::{BearRecord, ColorRecord};

#[derive(Debug, Clone)]
struct StoredBear {
    name: String,
    size: i64,
}

#[derive(Debug, Clone)]
struct StoredColor {
    name: String,
    hex: String,
}

struct State {
    bears: BTreeMap<i64, StoredBear>,
    colors: BTreeMap<i64, StoredColor>,
    links: BTreeSet<(i64, i64)>,
    next_bear_id: i64,
    next_color_id: i64,
}

impl State {
    fn new() -> Self {
        Self {
            bears: BTreeMap::new(),
            colors: BTreeMap::new(),
            links: BTreeSet::new(),
            next_bear_id: 1,
            next_color_id: 1,
        }
    }

    fn color_id_by_name(&self, name: &str) -> Option<i64> {
        self.colors
            .iter()
            .find(|(_, color)| color.name == name)
            .map(|(&id, _)| id)
    }

    fn ensure_color(&mut self, name: &str, hex: &str) -> i64 {
        if let Some(id) = self.color_id_by_name(name) {
            return id;
        }
        let id = self.next_color_id;
        self.next_color_id += 1;
        self.colors.insert(
            id,
            StoredColor {
                name: name.to_string(),
                hex: hex.to_string(),
            },
        );
        id
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    apply_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    op_log: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_apply_delay(Duration::ZERO)
    }

    /// A store whose write operations take at least `delay`, to widen the
    /// window in which overlapping writers would be observable.
    pub fn with_apply_delay(delay: Duration) -> Self {
        Self {
            state: Mutex::new(State::new()),
            apply_delay: delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            op_log: Mutex::new(Vec::new()),
        }
    }

    /// Highest number of write operations ever observed running at once.
    pub fn max_observed_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Labels of successfully applied write operations, in application order.
    pub fn applied_ops(&self) -> Vec<String> {
        self.op_log.lock().unwrap().clone()
    }

    async fn write<T>(
        &self,
        op: String,
        apply: impl FnOnce(&mut State) -> Result<T, RepoError>,
    ) -> Result<T, RepoError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            apply(&mut state)
        };
        if result.is_ok() {
            self.op_log.lock().unwrap().push(op);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl BearsRepo for MemoryStore {
    async fn list_bears_in_range(&self, min: i64, max: i64) -> Result<Vec<BearRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut bears: Vec<BearRecord> = state
            .bears
            .iter()
            .filter(|(_, bear)| bear.size >= min && bear.size <= max)
            .map(|(&id, bear)| BearRecord {
                id,
                name: bear.name.clone(),
                size: bear.size,
                color_ids: state
                    .links
                    .iter()
                    .filter(|(bear_id, _)| *bear_id == id)
                    .map(|(_, color_id)| *color_id)
                    .collect(),
            })
            .collect();
        bears.sort_by(|a, b| (a.size, a.id).cmp(&(b.size, b.id)));
        Ok(bears)
    }
}

#[async_trait]
impl ColorsRepo for MemoryStore {
    async fn list_all_colors(&self) -> Result<Vec<ColorRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .colors
            .iter()
            .map(|(&id, color)| ColorRecord {
                id,
                name: color.name.clone(),
                hex: color.hex.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl BearsWriteRepo for MemoryStore {
    async fn create_bear(&self, params: CreateBearParams) -> Result<BearRecord, RepoError> {
        let op = format!("create_bear {}", params.name);
        self.write(op, |state| {
            let id = state.next_bear_id;
            state.next_bear_id += 1;
            state.bears.insert(
                id,
                StoredBear {
                    name: params.name.clone(),
                    size: params.size,
                },
            );

            let mut color_ids = Vec::new();
            for name in normalize_names(&params.colors) {
                let color_id = state.ensure_color(&name, "");
                state.links.insert((id, color_id));
                color_ids.push(color_id);
            }
            color_ids.sort_unstable();

            Ok(BearRecord {
                id,
                name: params.name.clone(),
                size: params.size,
                color_ids,
            })
        })
        .await
    }

    async fn rename_bear(&self, id: i64, name: &str) -> Result<(), RepoError> {
        let op = format!("rename_bear {id} {name}");
        self.write(op, |state| {
            let bear = state.bears.get_mut(&id).ok_or(RepoError::NotFound)?;
            bear.name = name.to_string();
            Ok(())
        })
        .await
    }

    async fn resize_bear(&self, id: i64, size: i64) -> Result<(), RepoError> {
        let op = format!("resize_bear {id} {size}");
        self.write(op, |state| {
            let bear = state.bears.get_mut(&id).ok_or(RepoError::NotFound)?;
            bear.size = size;
            Ok(())
        })
        .await
    }

    async fn replace_bear_colors(&self, id: i64, colors: &[String]) -> Result<(), RepoError> {
        let op = format!("replace_bear_colors {id}");
        let colors = colors.to_vec();
        self.write(op, move |state| {
            if !state.bears.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            state.links.retain(|(bear_id, _)| *bear_id != id);
            for name in normalize_names(&colors) {
                let color_id = state.ensure_color(&name, "");
                state.links.insert((id, color_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_bear(&self, id: i64) -> Result<(), RepoError> {
        let op = format!("delete_bear {id}");
        self.write(op, |state| {
            state.bears.remove(&id).ok_or(RepoError::NotFound)?;
            state.links.retain(|(bear_id, _)| *bear_id != id);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ColorsWriteRepo for MemoryStore {
    async fn create_color(&self, name: &str, hex: &str) -> Result<i64, RepoError> {
        let name = normalize_name(name).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let hex = hex.to_string();
        let op = format!("create_color {name}");
        self.write(op, move |state| Ok(state.ensure_color(&name, &hex)))
            .await
    }

    async fn delete_color(&self, name: &str) -> Result<(), RepoError> {
        let name = normalize_name(name).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let op = format!("delete_color {name}");
        self.write(op, move |state| {
            let color_id = state.color_id_by_name(&name).ok_or(RepoError::NotFound)?;

            // Observed policy: every bear associated with the color goes too.
            let doomed: BTreeSet<i64> = state
                .links
                .iter()
                .filter(|(_, linked_color)| *linked_color == color_id)
                .map(|(bear_id, _)| *bear_id)
                .collect();
            state.bears.retain(|id, _| !doomed.contains(id));
            state
                .links
                .retain(|(bear_id, linked_color)| {
                    !doomed.contains(bear_id) && *linked_color != color_id
                });
            state.colors.remove(&color_id);
            Ok(())
        })
        .await
    }
}
