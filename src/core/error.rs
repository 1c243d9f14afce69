//! Error types for report resolution and persistence

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

use crate::core::identity::{ContainerId, IdParseError, UserId};

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

/// Errors raised by the report engine
///
/// Lookups that find nothing return `Ok(None)`; there is no not-found variant.
#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("user '{user}' is not permitted to {action} report '{report}'")]
    #[diagnostic(code(rpt::unauthorized))]
    Unauthorized {
        user: String,
        action: &'static str,
        report: String,
    },

    #[error("validation failed: {0}")]
    #[diagnostic(code(rpt::validation))]
    Validation(String),

    #[error("failed to build report cache for {container}: {message}")]
    #[diagnostic(
        code(rpt::cache::build),
        help("a stored report has an unregistered or unreadable type; no partial result is returned")
    )]
    Build {
        container: ContainerId,
        message: String,
    },

    #[error("cache build for {container} failed")]
    #[diagnostic(code(rpt::cache::build))]
    CacheBuild {
        container: ContainerId,
        #[source]
        source: Arc<ReportError>,
    },

    #[error("storage error: {0}")]
    #[diagnostic(code(rpt::storage))]
    Persistence(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    #[diagnostic(code(rpt::storage))]
    StoreUnavailable(String),

    #[error("{hook} hook rejected report '{report}': {message}")]
    #[diagnostic(code(rpt::hook))]
    Hook {
        hook: &'static str,
        report: String,
        message: String,
    },

    #[error("security policy store failed: {0}")]
    #[diagnostic(code(rpt::security))]
    Policy(String),

    #[error("failed to construct report type '{tag}': {message}")]
    #[diagnostic(code(rpt::registry))]
    Registry { tag: String, message: String },

    #[error("descriptor serialization error: {0}")]
    #[diagnostic(code(rpt::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("module descriptor error in {path}: {message}")]
    #[diagnostic(code(rpt::module))]
    ModuleDescriptor { path: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(rpt::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(rpt::id))]
    IdParse(#[from] IdParseError),

    #[error("IO error: {0}")]
    #[diagnostic(code(rpt::io))]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn unauthorized(user: Option<&UserId>, action: &'static str, report: &str) -> Self {
        ReportError::Unauthorized {
            user: user
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<anonymous>".to_string()),
            action,
            report: report.to_string(),
        }
    }

    /// True if the error aborted a write before any row was touched
    pub fn is_pre_write(&self) -> bool {
        matches!(
            self,
            ReportError::Unauthorized { .. }
                | ReportError::Validation(_)
                | ReportError::Hook { .. }
        )
    }
}
