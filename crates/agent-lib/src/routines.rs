//! Routine registry
//!
//! Tracks the live workers of each routine category (log readers, stats
//! pollers, ...). Categories are fixed at construction; workers come and go
//! with start/stop heartbeats and are keyed by id.

use crate::error::{RegistryError, RegistryResult};
use crate::models::WorkerHandle;
use chrono::{DateTime, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Routine category names recognized by the agent
pub mod categories {
    pub const LOG: &str = "log";
    pub const LOG_SKIP: &str = "logSkip";
    pub const LOG_WRONG_TYPE: &str = "logWrongType";
    pub const STATS: &str = "stats";

    pub const ALL: [&str; 4] = [LOG, LOG_SKIP, LOG_WRONG_TYPE, STATS];
}

/// Workers of a single category, keyed by id
#[derive(Debug, Default)]
pub struct RoutineSet {
    workers: RwLock<BTreeMap<String, WorkerHandle>>,
}

impl RoutineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a worker. Returns false, leaving the set unchanged, if the id is taken.
    pub async fn insert(&self, handle: WorkerHandle) -> bool {
        let mut workers = self.workers.write().await;
        match workers.entry(handle.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub async fn remove(&self, id: &str) -> Option<WorkerHandle> {
        self.workers.write().await.remove(id)
    }

    /// Refresh the timestamp of a known worker. Returns false if the id is absent.
    pub async fn refresh(&self, id: &str, at: DateTime<Utc>) -> bool {
        let mut workers = self.workers.write().await;
        match workers.get_mut(id) {
            Some(handle) => {
                let newer = WorkerHandle::new(id, handle.status().to_string(), at);
                handle.update(&newer).is_ok()
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<WorkerHandle> {
        self.workers.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    /// Worker ids in lexicographic order
    pub async fn ids(&self) -> Vec<String> {
        self.workers.read().await.keys().cloned().collect()
    }
}

/// Registry of routine categories and their live workers
#[derive(Debug)]
pub struct RoutineRegistry {
    sets: BTreeMap<String, RoutineSet>,
}

impl Default for RoutineRegistry {
    fn default() -> Self {
        Self::new(categories::ALL)
    }
}

impl RoutineRegistry {
    /// Create a registry with one empty set per category
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sets = categories
            .into_iter()
            .map(|name| (name.into(), RoutineSet::new()))
            .collect();
        Self { sets }
    }

    fn set(&self, category: &str) -> RegistryResult<&RoutineSet> {
        self.sets
            .get(category)
            .ok_or_else(|| RegistryError::UnknownCategory(category.to_string()))
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.sets.contains_key(category)
    }

    /// Category names in lexicographic order
    pub fn categories(&self) -> Vec<String> {
        self.sets.keys().cloned().collect()
    }

    pub async fn add_worker(&self, category: &str, id: &str) -> RegistryResult<()> {
        self.add_worker_at(category, id, "start", Utc::now()).await
    }

    pub async fn add_worker_at(
        &self,
        category: &str,
        id: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> RegistryResult<()> {
        let set = self.set(category)?;
        if !set.insert(WorkerHandle::new(id, status, at)).await {
            return Err(RegistryError::DuplicateWorker {
                category: category.to_string(),
                id: id.to_string(),
            });
        }
        debug!(category = %category, id = %id, "Worker added");
        Ok(())
    }

    /// Remove a worker. Absent ids are a no-op.
    pub async fn remove_worker(&self, category: &str, id: &str) -> RegistryResult<()> {
        let set = self.set(category)?;
        if set.remove(id).await.is_some() {
            debug!(category = %category, id = %id, "Worker removed");
        }
        Ok(())
    }

    /// Refresh a worker's last-update time. Returns whether the worker was present.
    pub async fn refresh_worker(
        &self,
        category: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> RegistryResult<bool> {
        Ok(self.set(category)?.refresh(id, at).await)
    }

    pub async fn worker(&self, category: &str, id: &str) -> RegistryResult<Option<WorkerHandle>> {
        Ok(self.set(category)?.get(id).await)
    }

    /// Number of workers in a category, -1 for an unknown category
    pub async fn count(&self, category: &str) -> i64 {
        match self.sets.get(category) {
            Some(set) => set.len().await as i64,
            None => -1,
        }
    }

    /// Worker ids of a category in lexicographic order
    pub async fn list(&self, category: &str) -> RegistryResult<Vec<String>> {
        Ok(self.set(category)?.ids().await)
    }

    /// Sorted ids of every category, keyed by category name
    pub async fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        let mut out = BTreeMap::new();
        for (name, set) in &self.sets {
            out.insert(name.clone(), set.ids().await);
        }
        out
    }
}
