//! Transactional save and delete
//!
//! Every write runs through the same phases: hooks, validation, one store
//! transaction, then cache invalidation and audit events. Invalidation and
//! events happen only after the transaction has committed, so a rolled back
//! write leaves the cache exactly as it was.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::ReportService;
use crate::core::audit::{AuditEvent, AuditKind};
use crate::core::descriptor::ReportDescriptor;
use crate::core::error::{ReportError, Result};
use crate::core::identity::{ReportId, UserId};
use crate::core::report::{ActionContext, Report};
use crate::core::security::{Permission, RoleAssignment};
use crate::core::store::ReportRecord;

/// Options for a single save
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Skip the permission checks (hooks and name checks still run)
    pub skip_validation: bool,
    /// Role assignments written in the same transaction, as imports do
    pub policy: Option<Vec<RoleAssignment>>,
}

impl SaveOptions {
    pub fn skip_validation() -> Self {
        Self {
            skip_validation: true,
            ..Default::default()
        }
    }

    pub fn with_policy(assignments: Vec<RoleAssignment>) -> Self {
        Self {
            policy: Some(assignments),
            ..Default::default()
        }
    }
}

impl ReportService {
    /// Save `report`, inserting or updating its row
    ///
    /// New reports are saved into the context container. A report whose row
    /// id no longer exists is inserted under a new id. A stored report keeps
    /// its container; saving it under another one is a validation error.
    /// Returns the saved report with its assigned id and metadata.
    pub fn save_report(
        &self,
        ctx: &ActionContext,
        report: &dyn Report,
        options: &SaveOptions,
    ) -> Result<Box<dyn Report>> {
        // Phase 1: hooks
        report.before_save(ctx)?;
        for listener in &self.listeners {
            listener.before_save(ctx, report)?;
        }

        // Phase 2: validation, against committed state
        let mut descriptor = report.descriptor().clone();
        if descriptor.id.is_transient() {
            descriptor.container = ctx.container.clone();
        }
        self.validate_save(ctx, report, &descriptor, options)?;

        // Phase 3: one transaction
        let now = Utc::now();
        let user = ctx.user.clone();
        let tx = self.store.begin()?;
        let previous = match descriptor.id.row_id() {
            Some(row_id) => tx.select_by_row_id(row_id)?,
            None => None,
        };
        if let Some(prev) = &previous {
            if prev.container_id != descriptor.container {
                return Err(ReportError::Validation(format!(
                    "report {} belongs to {} and cannot be saved into {}",
                    descriptor.id, prev.container_id, descriptor.container
                )));
            }
        }
        let was_private = match &previous {
            Some(prev) => stored_descriptor(&prev.descriptor_blob)?.owner.is_some(),
            None => false,
        };

        // Repeated under the write lock; the snapshot check in validate_save can race
        for row in tx.select_by_container_and_key(&descriptor.container, &descriptor.key)? {
            if row.row_id == descriptor.id.row_id() {
                continue;
            }
            let stored = stored_descriptor(&row.descriptor_blob)?;
            if stored.owner == descriptor.owner && stored.name == descriptor.name {
                return Err(duplicate_name(&descriptor));
            }
        }

        if previous.is_none() {
            descriptor.created = Some(now);
            descriptor.created_by = user.clone();
            descriptor.entity_id = None;
        }
        descriptor.modified = Some(now);
        descriptor.modified_by = user.clone();

        let saved = tx.insert_or_update(ReportRecord::from_descriptor(&descriptor)?)?;
        let row_id = saved.row_id.ok_or_else(|| {
            ReportError::StoreUnavailable("store returned a record without a row id".to_string())
        })?;
        descriptor.id = ReportId::Database(row_id);
        descriptor.entity_id = Some(saved.entity_id);

        if let Some(ref assignments) = options.policy {
            self.policy_store.assign(&tx, &descriptor.id, assignments)?;
        }
        tx.commit()?;

        // Phase 4: invalidate, then notify
        self.cache.invalidate(&descriptor.container);

        let kind = if previous.is_some() {
            AuditKind::Updated
        } else {
            AuditKind::Created
        };
        info!(
            report = %descriptor.id,
            container = %descriptor.container,
            name = %descriptor.name,
            "report {}",
            kind
        );
        self.emit(event(kind, &descriptor, user.as_ref()));
        if was_private && descriptor.is_shared() {
            self.emit(event(AuditKind::Shared, &descriptor, user.as_ref()));
        }

        let mut saved_report = report.clone_report();
        *saved_report.descriptor_mut() = descriptor;
        for listener in &self.listeners {
            listener.after_save(ctx, saved_report.as_ref());
        }
        Ok(saved_report)
    }

    fn validate_save(
        &self,
        ctx: &ActionContext,
        report: &dyn Report,
        descriptor: &ReportDescriptor,
        options: &SaveOptions,
    ) -> Result<()> {
        if descriptor.is_module_based() {
            return Err(ReportError::Validation(format!(
                "report '{}' is defined by a module and cannot be saved",
                descriptor.name
            )));
        }
        if !self.registries.reports.contains(report.type_tag()) {
            return Err(ReportError::Validation(format!(
                "unknown report type '{}'",
                report.type_tag()
            )));
        }
        if !self.registries.descriptors.contains(&descriptor.descriptor_type) {
            return Err(ReportError::Validation(format!(
                "unknown descriptor type '{}'",
                descriptor.descriptor_type
            )));
        }
        if descriptor.name.trim().is_empty() {
            return Err(ReportError::Validation("report name is required".to_string()));
        }

        let stored = match descriptor.id.row_id() {
            Some(row_id) => self.cache.get_by_row_id(&descriptor.container, row_id)?,
            None => None,
        };

        if !options.skip_validation {
            if let Some(ref user) = ctx.user {
                self.check_save_permission(user, report, descriptor, stored.as_deref())?;
            }
        }

        let duplicate = self
            .cache
            .get_by_key(&descriptor.container, &descriptor.key)?
            .into_iter()
            .any(|r| {
                let d = r.descriptor();
                d.id != descriptor.id && d.owner == descriptor.owner && d.name == descriptor.name
            });
        if duplicate {
            return Err(duplicate_name(descriptor));
        }
        Ok(())
    }

    fn check_save_permission(
        &self,
        user: &UserId,
        report: &dyn Report,
        descriptor: &ReportDescriptor,
        stored: Option<&dyn Report>,
    ) -> Result<()> {
        let policy = self.policy.as_ref();
        match stored {
            Some(stored) => {
                if !stored.can_edit(user, policy) {
                    return Err(ReportError::unauthorized(Some(user), "edit", &descriptor.name));
                }
            }
            None => {
                let owned_by_other = descriptor.owner.as_ref().is_some_and(|o| o != user);
                if owned_by_other
                    || !policy.has_permission(user, &descriptor.container, Permission::Insert)
                {
                    return Err(ReportError::unauthorized(Some(user), "create", &descriptor.name));
                }
            }
        }

        if descriptor.is_shared() {
            let mut candidate = report.clone_report();
            *candidate.descriptor_mut() = descriptor.clone();
            if !candidate.can_share(user, policy) {
                return Err(ReportError::unauthorized(Some(user), "share", &descriptor.name));
            }
        }
        Ok(())
    }

    /// Delete `report`; returns whether a row was removed
    ///
    /// The report's security policy is removed in the same transaction.
    pub fn delete_report(&self, ctx: &ActionContext, report: &dyn Report) -> Result<bool> {
        report.before_delete(ctx)?;
        for listener in &self.listeners {
            listener.before_delete(ctx, report)?;
        }

        let descriptor = report.descriptor();
        if descriptor.is_module_based() {
            return Err(ReportError::Validation(format!(
                "report '{}' is defined by a module and cannot be deleted",
                descriptor.name
            )));
        }
        let Some(row_id) = descriptor.id.row_id() else {
            return Err(ReportError::Validation(format!(
                "report '{}' has not been saved",
                descriptor.name
            )));
        };
        let container = descriptor.container.clone();

        if let Some(ref user) = ctx.user {
            let stored = self
                .cache
                .get_by_row_id(&container, row_id)?
                .ok_or_else(|| ReportError::unauthorized(Some(user), "delete", &descriptor.name))?;
            if !stored.can_delete(user, self.policy.as_ref()) {
                return Err(ReportError::unauthorized(Some(user), "delete", &descriptor.name));
            }
        }

        let tx = self.store.begin()?;
        let deleted = tx.delete_by_container_and_row_id(&container, row_id)?;
        if deleted {
            self.policy_store.delete(&tx, &descriptor.id)?;
        }
        tx.commit()?;

        if deleted {
            self.cache.invalidate(&container);
            info!(report = %descriptor.id, %container, "report deleted");
            self.emit(event(AuditKind::Deleted, descriptor, ctx.user.as_ref()));
            for listener in &self.listeners {
                listener.after_delete(ctx, report);
            }
        }
        Ok(deleted)
    }

    /// Change a report's display order through the full save path
    pub fn set_report_display_order(
        &self,
        ctx: &ActionContext,
        report: &dyn Report,
        display_order: i32,
    ) -> Result<Box<dyn Report>> {
        let mut updated = report.clone_report();
        updated.descriptor_mut().display_order = display_order;
        self.save_report(ctx, updated.as_ref(), &SaveOptions::default())
    }

    /// Clear `category_id` from every report in the context container
    ///
    /// Each report is re-saved individually, so hooks, validation,
    /// invalidation and audit events run once per report. Returns the number
    /// of reports updated.
    pub fn on_category_deleted(&self, ctx: &ActionContext, category_id: i64) -> Result<usize> {
        let affected: Vec<Arc<dyn Report>> = self
            .cache
            .get_all(&ctx.container)?
            .into_iter()
            .filter(|r| r.descriptor().category_id == Some(category_id))
            .collect();

        for report in &affected {
            let mut cleared = report.clone_report();
            cleared.descriptor_mut().category_id = None;
            self.save_report(ctx, cleared.as_ref(), &SaveOptions::default())?;
        }

        info!(container = %ctx.container, category_id, reports = affected.len(), "cleared deleted category");
        Ok(affected.len())
    }
}

fn stored_descriptor(blob: &[u8]) -> Result<ReportDescriptor> {
    Ok(serde_json::from_slice(blob)?)
}

fn duplicate_name(descriptor: &ReportDescriptor) -> ReportError {
    ReportError::Validation(format!(
        "a report named '{}' already exists under key '{}' in {}",
        descriptor.name, descriptor.key, descriptor.container
    ))
}

fn event(kind: AuditKind, descriptor: &ReportDescriptor, user: Option<&UserId>) -> AuditEvent {
    AuditEvent {
        kind,
        report: descriptor.id.clone(),
        name: descriptor.name.clone(),
        container: descriptor.container.clone(),
        user: user.cloned(),
        at: Utc::now(),
    }
}
