//! Cache type definitions
//!
//! A [`CacheEntry`] is the immutable snapshot of one container's persisted
//! reports. It is built once and replaced wholesale on invalidation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::identity::{ContainerId, EntityId};
use crate::core::report::Report;

/// Indexed snapshot of one container's reports
pub struct CacheEntry {
    container: ContainerId,
    /// Invalidation epoch the entry was built under
    pub(super) epoch: u64,
    reports: Vec<Arc<dyn Report>>,
    by_row_id: HashMap<i64, usize>,
    by_entity_id: HashMap<EntityId, usize>,
    by_key: HashMap<String, Vec<usize>>,
    inheritable: Vec<usize>,
}

impl CacheEntry {
    /// Index `reports`, keeping their order
    pub fn new(container: ContainerId, epoch: u64, reports: Vec<Arc<dyn Report>>) -> Self {
        let mut by_row_id = HashMap::with_capacity(reports.len());
        let mut by_entity_id = HashMap::with_capacity(reports.len());
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        let mut inheritable = Vec::new();

        for (idx, report) in reports.iter().enumerate() {
            let d = report.descriptor();
            if let Some(row_id) = d.id.row_id() {
                by_row_id.insert(row_id, idx);
            }
            if let Some(entity_id) = d.entity_id {
                by_entity_id.insert(entity_id, idx);
            }
            by_key.entry(d.key.clone()).or_default().push(idx);
            if d.is_inheritable() {
                inheritable.push(idx);
            }
        }

        Self {
            container,
            epoch,
            reports,
            by_row_id,
            by_entity_id,
            by_key,
            inheritable,
        }
    }

    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    pub fn get_by_row_id(&self, row_id: i64) -> Option<Arc<dyn Report>> {
        self.by_row_id
            .get(&row_id)
            .map(|&idx| Arc::clone(&self.reports[idx]))
    }

    pub fn get_by_entity_id(&self, entity_id: &EntityId) -> Option<Arc<dyn Report>> {
        self.by_entity_id
            .get(entity_id)
            .map(|&idx| Arc::clone(&self.reports[idx]))
    }

    /// Reports stored under `key`, in row id order
    pub fn get_by_key(&self, key: &str) -> Vec<Arc<dyn Report>> {
        self.collect(self.by_key.get(key).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn get_all(&self) -> Vec<Arc<dyn Report>> {
        self.reports.clone()
    }

    pub fn get_inheritable(&self) -> Vec<Arc<dyn Report>> {
        self.collect(&self.inheritable)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    fn collect(&self, indices: &[usize]) -> Vec<Arc<dyn Report>> {
        indices
            .iter()
            .map(|&idx| Arc::clone(&self.reports[idx]))
            .collect()
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("container", &self.container)
            .field("epoch", &self.epoch)
            .field("reports", &self.reports.len())
            .field("inheritable", &self.inheritable.len())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of full container scans performed
    pub builds: u64,
    pub invalidations: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Hit rate (0.0-1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
