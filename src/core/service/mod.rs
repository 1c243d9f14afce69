//! Report service - resolution and persistence over the container cache
//!
//! A [`ReportService`] owns every piece of engine state: the type
//! registries, the record store, the container cache and the collaborators
//! it calls into. There is no process-global state; build one service at
//! start-up and share it.

mod persist;
mod resolve;

pub use persist::SaveOptions;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::core::cache::{CacheStats, ContainerCache, DEFAULT_CAPACITY};
use crate::core::config::EngineConfig;
use crate::core::container::ContainerTree;
use crate::core::error::Result;
use crate::core::module::{FileModuleSource, ModuleDescriptorSource, NoModuleReports};
use crate::core::registry::Registries;
use crate::core::report::{ActionContext, Report};
use crate::core::security::{RoleGrants, SecurityPolicy, SecurityPolicyStore, StoredPolicies};
use crate::core::store::RecordStore;

/// Extension points around report writes
///
/// `before_*` hooks run ahead of validation and may abort the operation.
/// `after_*` hooks run once the write has committed and cannot fail it.
pub trait ReportListener: Send + Sync {
    fn before_save(&self, _ctx: &ActionContext, _report: &dyn Report) -> Result<()> {
        Ok(())
    }

    fn before_delete(&self, _ctx: &ActionContext, _report: &dyn Report) -> Result<()> {
        Ok(())
    }

    fn after_save(&self, _ctx: &ActionContext, _report: &dyn Report) {}

    fn after_delete(&self, _ctx: &ActionContext, _report: &dyn Report) {}
}

pub struct ReportService {
    registries: Arc<Registries>,
    store: Arc<RecordStore>,
    cache: ContainerCache,
    containers: ContainerTree,
    modules: Arc<dyn ModuleDescriptorSource>,
    policy: Arc<dyn SecurityPolicy>,
    policy_store: Arc<dyn SecurityPolicyStore>,
    audit: Arc<dyn AuditSink>,
    listeners: Vec<Arc<dyn ReportListener>>,
}

impl ReportService {
    pub fn builder(store: RecordStore) -> ReportServiceBuilder {
        ReportServiceBuilder::new(store)
    }

    /// Build a service from layered configuration
    ///
    /// Grants from the configuration answer permission checks. Report
    /// policies live in the record store.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = if config.is_in_memory() {
            RecordStore::open_in_memory()?
        } else {
            RecordStore::open(&config.database_path())?
        };

        let grants = Arc::new(config.role_grants());
        let mut builder = Self::builder(store)
            .containers(config.container_tree())
            .cache_capacity(config.cache_capacity())
            .security(grants);
        if let Some(ref modules_dir) = config.modules_dir {
            builder = builder.modules(Arc::new(FileModuleSource::new(modules_dir)));
        }
        Ok(builder.build())
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn containers(&self) -> &ContainerTree {
        &self.containers
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached container snapshot
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Shut the service down, releasing cached state and the store
    pub fn close(self) {
        let stats = self.cache.stats();
        self.cache.invalidate_all();
        debug!(
            builds = stats.builds,
            hits = stats.hits,
            misses = stats.misses,
            "report service closed"
        );
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.record(&event);
    }
}

impl fmt::Debug for ReportService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportService")
            .field("registries", &self.registries)
            .field("containers", &self.containers)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Assembles a [`ReportService`]
///
/// Collaborators left unset default to: built-in registries, no module
/// reports, an empty grant table (nobody may do anything), report policies
/// kept in the record store and the tracing audit sink.
pub struct ReportServiceBuilder {
    store: RecordStore,
    registries: Option<Registries>,
    containers: ContainerTree,
    modules: Arc<dyn ModuleDescriptorSource>,
    policy: Option<Arc<dyn SecurityPolicy>>,
    policy_store: Arc<dyn SecurityPolicyStore>,
    audit: Arc<dyn AuditSink>,
    listeners: Vec<Arc<dyn ReportListener>>,
    cache_capacity: u64,
}

impl ReportServiceBuilder {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            registries: None,
            containers: ContainerTree::default(),
            modules: Arc::new(NoModuleReports),
            policy: None,
            policy_store: Arc::new(StoredPolicies),
            audit: Arc::new(TracingAuditSink),
            listeners: Vec::new(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Use `registries` instead of the built-in set
    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = Some(registries);
        self
    }

    pub fn containers(mut self, containers: ContainerTree) -> Self {
        self.containers = containers;
        self
    }

    pub fn modules(mut self, modules: Arc<dyn ModuleDescriptorSource>) -> Self {
        self.modules = modules;
        self
    }

    pub fn security(mut self, policy: Arc<dyn SecurityPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use `policy_store` instead of the `report_policies` table
    pub fn policy_store(mut self, policy_store: Arc<dyn SecurityPolicyStore>) -> Self {
        self.policy_store = policy_store;
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ReportListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> ReportService {
        let registries = Arc::new(self.registries.unwrap_or_else(Registries::builtin));
        let store = Arc::new(self.store);
        let cache = ContainerCache::new(
            Arc::clone(&store),
            Arc::clone(&registries),
            self.cache_capacity,
        );
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(RoleGrants::new()) as Arc<dyn SecurityPolicy>);

        ReportService {
            registries,
            store,
            cache,
            containers: self.containers,
            modules: self.modules,
            policy,
            policy_store: self.policy_store,
            audit: self.audit,
            listeners: self.listeners,
        }
    }
}
