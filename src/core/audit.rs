//! Report lifecycle audit events

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::identity::{ContainerId, ReportId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Created,
    Updated,
    Deleted,
    /// A private report was made public
    Shared,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::Created => write!(f, "created"),
            AuditKind::Updated => write!(f, "updated"),
            AuditKind::Deleted => write!(f, "deleted"),
            AuditKind::Shared => write!(f, "shared"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub report: ReportId,
    pub name: String,
    pub container: ContainerId,
    pub user: Option<UserId>,
    pub at: DateTime<Utc>,
}

/// Receives lifecycle notifications after a write has committed
///
/// Sinks are fire-and-forget: they cannot fail the operation.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits each event as a structured log line on the `rpt::audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        info!(
            target: "rpt::audit",
            kind = %event.kind,
            report = %event.report,
            name = %event.name,
            container = %event.container,
            user = event.user.as_ref().map(|u| u.as_str()).unwrap_or("<system>"),
            "report {}", event.kind
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: AuditKind) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| ev.kind == kind).count())
            .unwrap_or(0)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
