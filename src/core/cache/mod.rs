//! Per-container report cache
//!
//! This module provides the in-process cache that:
//! - Builds one indexed snapshot per container on first access
//! - Runs at most one build per cold container, however many callers miss
//! - Replaces snapshots wholesale on invalidation, never mutating them
//!
//! Every container carries an invalidation epoch. A build records the epoch
//! it started under; if an invalidation lands while the build is scanning,
//! the finished snapshot is stale and is thrown away on first read.

mod sync;
mod types;

pub use types::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use moka::sync::Cache;
use tracing::{debug, warn};

use crate::core::error::{ReportError, Result};
use crate::core::identity::{ContainerId, EntityId};
use crate::core::registry::Registries;
use crate::core::report::Report;
use crate::core::store::RecordStore;

/// Default number of containers kept in memory
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Lazily built, single-flight cache of persisted reports per container
pub struct ContainerCache {
    cache: Cache<ContainerId, Arc<CacheEntry>>,
    epochs: DashMap<ContainerId, u64>,
    store: Arc<RecordStore>,
    registries: Arc<Registries>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    invalidations: AtomicU64,
}

impl ContainerCache {
    pub fn new(store: Arc<RecordStore>, registries: Arc<Registries>, capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            epochs: DashMap::new(),
            store,
            registries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Snapshot for `container`, building it if cold
    ///
    /// Concurrent callers that miss the same container wait for a single
    /// build and share its result. A build failure is returned to every
    /// waiter and nothing is cached.
    pub fn entry(&self, container: &ContainerId) -> Result<Arc<CacheEntry>> {
        loop {
            let entry = match self.cache.get(container) {
                Some(entry) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    entry
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.cache
                        .try_get_with(container.clone(), || self.build(container))
                        .map_err(|source| ReportError::CacheBuild {
                            container: container.clone(),
                            source,
                        })?
                }
            };

            if entry.epoch == self.epoch(container) {
                return Ok(entry);
            }
            warn!(%container, epoch = entry.epoch, "cache entry raced an invalidation, rebuilding");
            self.cache.invalidate(container);
        }
    }

    fn build(&self, container: &ContainerId) -> Result<Arc<CacheEntry>> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        // Registered so invalidate_all can bump it mid-build
        let epoch = *self.epochs.entry(container.clone()).or_insert(0);
        sync::build_entry(&self.store, &self.registries, container, epoch).map(Arc::new)
    }

    fn epoch(&self, container: &ContainerId) -> u64 {
        self.epochs.get(container).map(|e| *e).unwrap_or(0)
    }

    pub fn get_by_row_id(
        &self,
        container: &ContainerId,
        row_id: i64,
    ) -> Result<Option<Arc<dyn Report>>> {
        Ok(self.entry(container)?.get_by_row_id(row_id))
    }

    pub fn get_by_entity_id(
        &self,
        container: &ContainerId,
        entity_id: &EntityId,
    ) -> Result<Option<Arc<dyn Report>>> {
        Ok(self.entry(container)?.get_by_entity_id(entity_id))
    }

    pub fn get_by_key(&self, container: &ContainerId, key: &str) -> Result<Vec<Arc<dyn Report>>> {
        Ok(self.entry(container)?.get_by_key(key))
    }

    pub fn get_all(&self, container: &ContainerId) -> Result<Vec<Arc<dyn Report>>> {
        Ok(self.entry(container)?.get_all())
    }

    pub fn get_inheritable(&self, container: &ContainerId) -> Result<Vec<Arc<dyn Report>>> {
        Ok(self.entry(container)?.get_inheritable())
    }

    /// Drop the snapshot for `container`
    ///
    /// Only touches `container`; builds of other containers are unaffected.
    pub fn invalidate(&self, container: &ContainerId) {
        *self.epochs.entry(container.clone()).or_insert(0) += 1;
        self.cache.invalidate(container);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(%container, "invalidated container cache");
    }

    pub fn invalidate_all(&self) {
        for mut epoch in self.epochs.iter_mut() {
            *epoch += 1;
        }
        self.cache.invalidate_all();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("invalidated all container caches");
    }

    /// True if a snapshot for `container` is currently cached
    pub fn is_cached(&self, container: &ContainerId) -> bool {
        self.cache.contains_key(container)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}
