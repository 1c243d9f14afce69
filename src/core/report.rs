//! Report trait - the capabilities the engine needs from every report kind

use std::fmt;

use crate::core::descriptor::ReportDescriptor;
use crate::core::error::{ReportError, Result};
use crate::core::identity::{ContainerId, ReportId, UserId};
use crate::core::security::{Permission, SecurityPolicy};

/// Who is acting, and in which container
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// `None` for system and maintenance callers
    pub user: Option<UserId>,
    pub container: ContainerId,
}

impl ActionContext {
    pub fn new(user: UserId, container: ContainerId) -> Self {
        Self {
            user: Some(user),
            container,
        }
    }

    pub fn system(container: ContainerId) -> Self {
        Self {
            user: None,
            container,
        }
    }
}

/// Common interface for all report kinds
///
/// Cached reports are handed out as `Arc<dyn Report>` and are never mutated;
/// callers that want to change one take a copy with [`Report::clone_report`].
pub trait Report: fmt::Debug + Send + Sync {
    /// Tag this report is registered under
    fn type_tag(&self) -> &str;

    fn descriptor(&self) -> &ReportDescriptor;

    fn descriptor_mut(&mut self) -> &mut ReportDescriptor;

    fn clone_report(&self) -> Box<dyn Report>;

    fn id(&self) -> &ReportId {
        &self.descriptor().id
    }

    /// Runs before any validation or write of a save
    fn before_save(&self, _ctx: &ActionContext) -> Result<()> {
        Ok(())
    }

    /// Runs before any validation or write of a delete
    fn before_delete(&self, _ctx: &ActionContext) -> Result<()> {
        Ok(())
    }

    /// Private reports are readable only by their owner
    fn can_read(&self, user: &UserId, policy: &dyn SecurityPolicy) -> bool {
        let d = self.descriptor();
        if let Some(owner) = &d.owner {
            if owner != user {
                return false;
            }
        }
        policy.has_permission(user, &d.container, Permission::Read)
    }

    fn can_edit(&self, user: &UserId, policy: &dyn SecurityPolicy) -> bool {
        self.can_modify(user, policy, Permission::Update)
    }

    fn can_delete(&self, user: &UserId, policy: &dyn SecurityPolicy) -> bool {
        self.can_modify(user, policy, Permission::Delete)
    }

    fn can_share(&self, user: &UserId, policy: &dyn SecurityPolicy) -> bool {
        policy.has_permission(user, &self.descriptor().container, Permission::Share)
    }

    /// Shared rule for edit and delete
    ///
    /// Module-based reports are read-only. Private reports belong to their
    /// owner. Shared reports need `permission`, or insert rights for the
    /// user who created them.
    fn can_modify(
        &self,
        user: &UserId,
        policy: &dyn SecurityPolicy,
        permission: Permission,
    ) -> bool {
        let d = self.descriptor();
        if d.is_module_based() {
            return false;
        }
        match &d.owner {
            Some(owner) => owner == user,
            None => {
                if d.created_by.as_ref() == Some(user)
                    && policy.has_permission(user, &d.container, Permission::Insert)
                {
                    return true;
                }
                policy.has_permission(user, &d.container, permission)
            }
        }
    }
}

/// The built-in report kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Redirect to a URL
    Link,
    /// A bundle of attached files
    Attachment,
    /// A saved query definition
    Query,
    RScript,
    JavaScript,
    Chart,
}

impl ReportKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ReportKind::Link => "ReportService.linkReport",
            ReportKind::Attachment => "ReportService.attachmentReport",
            ReportKind::Query => "ReportService.queryReport",
            ReportKind::RScript => "ReportService.rReport",
            ReportKind::JavaScript => "ReportService.javascriptReport",
            ReportKind::Chart => "Study.chartReport",
        }
    }

    /// Descriptor type a new report of this kind starts with
    pub fn descriptor_type(&self) -> &'static str {
        match self {
            ReportKind::Query => "queryReportDescriptor",
            ReportKind::RScript => "rReportDescriptor",
            ReportKind::JavaScript => "jsReportDescriptor",
            _ => crate::core::descriptor::DEFAULT_DESCRIPTOR_TYPE,
        }
    }

    pub fn all() -> &'static [ReportKind] {
        &[
            ReportKind::Link,
            ReportKind::Attachment,
            ReportKind::Query,
            ReportKind::RScript,
            ReportKind::JavaScript,
            ReportKind::Chart,
        ]
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.type_tag() == tag)
    }

    /// Properties that must be set before a report of this kind is saved
    fn required_properties(&self) -> &'static [&'static str] {
        match self {
            ReportKind::Link => &["url"],
            ReportKind::Query => &["schemaName", "queryName"],
            ReportKind::RScript | ReportKind::JavaScript => &["script"],
            ReportKind::Attachment | ReportKind::Chart => &[],
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Link => write!(f, "link"),
            ReportKind::Attachment => write!(f, "attachment"),
            ReportKind::Query => write!(f, "query"),
            ReportKind::RScript => write!(f, "r"),
            ReportKind::JavaScript => write!(f, "javascript"),
            ReportKind::Chart => write!(f, "chart"),
        }
    }
}

/// A report of one of the built-in kinds
#[derive(Debug, Clone)]
pub struct StandardReport {
    kind: ReportKind,
    descriptor: ReportDescriptor,
}

impl StandardReport {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            descriptor: ReportDescriptor::new(kind.descriptor_type(), kind.type_tag()),
        }
    }

    pub fn with_descriptor(kind: ReportKind, descriptor: ReportDescriptor) -> Self {
        Self { kind, descriptor }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }
}

impl Report for StandardReport {
    fn type_tag(&self) -> &str {
        self.kind.type_tag()
    }

    fn descriptor(&self) -> &ReportDescriptor {
        &self.descriptor
    }

    fn descriptor_mut(&mut self) -> &mut ReportDescriptor {
        &mut self.descriptor
    }

    fn clone_report(&self) -> Box<dyn Report> {
        Box::new(self.clone())
    }

    fn before_save(&self, _ctx: &ActionContext) -> Result<()> {
        for prop in self.kind.required_properties() {
            let missing = self
                .descriptor
                .property(prop)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ReportError::Hook {
                    hook: "before save",
                    report: self.descriptor.name.clone(),
                    message: format!("{} report requires the '{}' property", self.kind, prop),
                });
            }
        }

        if self.kind == ReportKind::Link {
            let url = self.descriptor.property("url").unwrap_or_default();
            if !(url.starts_with('/') || url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ReportError::Hook {
                    hook: "before save",
                    report: self.descriptor.name.clone(),
                    message: format!("'{}' is not a relative or http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}
