//! rpt: report identity, inheritance resolution and caching
//!
//! Saved reports live in a tree of containers. This crate resolves which
//! reports a user sees in a container, merging module-bundled report files
//! with database reports, and persists changes transactionally behind a
//! per-container, single-flight cache.

pub mod cli;
pub mod core;
pub mod logging;

pub use crate::core::{
    ActionContext, ContainerId, Report, ReportError, ReportId, ReportService, Result, UserId,
};
