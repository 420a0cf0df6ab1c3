//! Process-wide artifact cache with single-flight loading
//!
//! Each path owns a once-cell slot. Concurrent first requests for the same
//! path block on that slot while exactly one of them runs the loader; all of
//! them then observe the same instance. A failed load leaves the slot empty
//! so a later request may try again. Entries are never evicted.

use anyhow::Result;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Slot<T> = Arc<OnceCell<Arc<T>>>;

pub struct ArtifactCache<T: ?Sized> {
    slots: DashMap<PathBuf, Slot<T>>,
    loads: AtomicU64,
}

impl<T: ?Sized> Default for ArtifactCache<T> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            loads: AtomicU64::new(0),
        }
    }
}

impl<T: ?Sized> ArtifactCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached artifact for `path`, running `load` if none is cached yet
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        // The shard lock is released before the loader runs
        let slot = self
            .slots
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let value = slot.get_or_try_init(|| {
            self.loads.fetch_add(1, Ordering::Relaxed);
            load()
        })?;
        Ok(Arc::clone(value))
    }

    /// Cached artifact for `path`, without loading
    pub fn get(&self, path: &Path) -> Option<Arc<T>> {
        self.slots
            .get(path)
            .and_then(|slot| slot.get().map(Arc::clone))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Number of loaded artifacts
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loader invocations, successful or not
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}
