//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};

use crate::cli::args::GlobalOpts;
use crate::core::config::EngineConfig;
use crate::core::identity::{ContainerId, ReportId, UserId};
use crate::core::report::ActionContext;
use crate::core::service::ReportService;

/// Everything a command needs: the service and who is acting where
pub struct Session {
    pub service: ReportService,
    pub user: Option<UserId>,
    pub container: ContainerId,
}

impl Session {
    /// Load configuration and open the report service
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let config = EngineConfig::load(global.config.as_deref())?;
        let container = ContainerId::parse(&global.container).into_diagnostic()?;
        let user = global.user.as_deref().map(UserId::new).or_else(|| config.user());
        let service = ReportService::from_config(&config)?;
        Ok(Self {
            service,
            user,
            container,
        })
    }

    pub fn context(&self) -> ActionContext {
        ActionContext {
            user: self.user.clone(),
            container: self.container.clone(),
        }
    }

    pub fn parse_id(&self, text: &str) -> Result<ReportId> {
        self.service.get_report_identifier(text).into_diagnostic()
    }
}

/// Truncate a string to max_len, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
