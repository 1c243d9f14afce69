//! Core module - report identity, resolution, caching and persistence

pub mod audit;
pub mod cache;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod module;
pub mod registry;
pub mod report;
pub mod security;
pub mod service;
pub mod store;

pub use audit::{AuditEvent, AuditKind, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use cache::{CacheEntry, CacheStats, ContainerCache};
pub use config::EngineConfig;
pub use container::ContainerTree;
pub use descriptor::{ReportDescriptor, ReportFlags};
pub use error::{ReportError, Result};
pub use identity::{ContainerId, EntityId, IdParseError, ReportId, UserId};
pub use module::{FileModuleSource, ModuleDescriptorSource, NoModuleReports, SerializedDescriptor};
pub use registry::{Registries, TypeRegistry};
pub use report::{ActionContext, Report, ReportKind, StandardReport};
pub use security::{
    Permission, Role, RoleAssignment, RoleGrants, SecurityPolicy, SecurityPolicyStore,
    StoredPolicies,
};
pub use service::{ReportListener, ReportService, ReportServiceBuilder, SaveOptions};
pub use store::{RecordStore, ReportRecord, StoreTransaction};
