//! Report resolution: inheritance walk, module merge, permission filter

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use super::ReportService;
use crate::core::error::Result;
use crate::core::identity::{ContainerId, EntityId, IdParseError, ReportId, UserId};
use crate::core::report::Report;

type Found = Option<Arc<dyn Report>>;

impl ReportService {
    /// Report `row_id` as seen from `container`
    ///
    /// The container's own snapshot is checked first. Otherwise the strict
    /// ancestors below the root are walked nearest first, then the shared
    /// container; at those levels only inheritable reports count.
    pub fn get_report(&self, container: &ContainerId, row_id: i64) -> Result<Found> {
        self.resolve_inherited(container, |c| self.cache.get_by_row_id(c, row_id))
    }

    /// Same walk as [`get_report`](Self::get_report), keyed by entity id
    pub fn get_report_by_entity_id(
        &self,
        container: &ContainerId,
        entity_id: &EntityId,
    ) -> Result<Found> {
        self.resolve_inherited(container, |c| self.cache.get_by_entity_id(c, entity_id))
    }

    fn resolve_inherited<F>(&self, container: &ContainerId, lookup: F) -> Result<Found>
    where
        F: Fn(&ContainerId) -> Result<Found>,
    {
        if let Some(report) = lookup(container)? {
            return Ok(Some(report));
        }

        for ancestor in container.ancestors().filter(|c| !c.is_root()) {
            if let Some(report) = lookup(&ancestor)? {
                if report.descriptor().is_inheritable() {
                    return Ok(Some(report));
                }
            }
        }

        let shared = self.containers.shared();
        if shared != container {
            if let Some(report) = lookup(shared)? {
                if report.descriptor().is_inheritable() {
                    return Ok(Some(report));
                }
            }
        }
        Ok(None)
    }

    /// Reports visible to `user` in `container`, optionally only under `key`
    ///
    /// Module reports come first, then the container's own database reports.
    /// The lookup never walks the container tree; inherited reports come from
    /// [`get_inheritable_reports`](Self::get_inheritable_reports). A `None`
    /// user skips the permission filter.
    pub fn get_reports(
        &self,
        user: Option<&UserId>,
        container: &ContainerId,
        key: Option<&str>,
    ) -> Result<Vec<Arc<dyn Report>>> {
        let mut reports = self.module_reports(container, key)?;
        let stored = match key {
            Some(key) => self.cache.get_by_key(container, key)?,
            None => self.cache.get_all(container)?,
        };
        reports.extend(stored);
        Ok(self.finish(user, reports))
    }

    /// Inheritable reports of the ancestors of `container` and the shared container
    pub fn get_inheritable_reports(
        &self,
        user: Option<&UserId>,
        container: &ContainerId,
        key: Option<&str>,
    ) -> Result<Vec<Arc<dyn Report>>> {
        let mut sources: Vec<ContainerId> =
            container.ancestors().filter(|c| !c.is_root()).collect();
        let shared = self.containers.shared();
        if shared != container && !sources.contains(shared) {
            sources.push(shared.clone());
        }

        let mut reports = Vec::new();
        for source in &sources {
            reports.extend(
                self.cache
                    .get_inheritable(source)?
                    .into_iter()
                    .filter(|r| key.map_or(true, |k| r.descriptor().key == k)),
            );
        }
        Ok(self.finish(user, reports))
    }

    /// True if a report visible to `user` under `key` in `container` is called `name`
    pub fn report_name_exists(
        &self,
        user: &UserId,
        container: &ContainerId,
        name: &str,
        key: &str,
    ) -> Result<bool> {
        Ok(self
            .get_reports(Some(user), container, Some(key))?
            .iter()
            .any(|r| r.descriptor().name == name))
    }

    /// Find a report of any kind by id among those visible in `container`
    pub fn find_report(
        &self,
        user: Option<&UserId>,
        container: &ContainerId,
        id: &ReportId,
    ) -> Result<Found> {
        match id {
            ReportId::Database(row_id) => {
                let found = self.get_report(container, *row_id)?;
                Ok(found.filter(|r| self.is_visible(user, r.as_ref())))
            }
            ReportId::Module { .. } => Ok(self
                .module_reports(container, None)?
                .into_iter()
                .find(|r| r.id() == id)),
            ReportId::Transient => Ok(None),
        }
    }

    /// Parse the textual form of a report id
    pub fn get_report_identifier(&self, text: &str) -> std::result::Result<ReportId, IdParseError> {
        ReportId::parse(text)
    }

    /// A new, unsaved report of type `tag` carrying its default descriptor
    pub fn create_report_instance(&self, tag: &str) -> Result<Option<Box<dyn Report>>> {
        let Some(mut report) = self.registries.create_report(tag)? else {
            return Ok(None);
        };
        let descriptor_type = report.descriptor().descriptor_type.clone();
        if let Some(mut descriptor) = self.registries.descriptors.create(&descriptor_type)? {
            descriptor.report_type = report.type_tag().to_string();
            *report.descriptor_mut() = descriptor;
        }
        Ok(Some(report))
    }

    fn module_reports(
        &self,
        container: &ContainerId,
        key: Option<&str>,
    ) -> Result<Vec<Arc<dyn Report>>> {
        let mut reports = Vec::new();
        for module in self.containers.active_modules(container) {
            for serialized in self.modules.get_descriptors(module, key)? {
                let descriptor = match serialized.parse(container) {
                    Ok(descriptor) => descriptor,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable module report");
                        continue;
                    }
                };
                let report_type = descriptor.report_type.clone();
                match self.registries.instantiate(descriptor)? {
                    Some(report) => reports.push(Arc::from(report)),
                    None => warn!(
                        module = %module,
                        path = %serialized.path,
                        %report_type,
                        "skipping module report of unregistered type"
                    ),
                }
            }
        }
        Ok(reports)
    }

    fn is_visible(&self, user: Option<&UserId>, report: &dyn Report) -> bool {
        if report.descriptor().is_module_based() {
            return true;
        }
        match user {
            Some(user) => report.can_read(user, self.policy.as_ref()),
            None => true,
        }
    }

    /// Filter, de-duplicate by id and order by display order
    fn finish(&self, user: Option<&UserId>, reports: Vec<Arc<dyn Report>>) -> Vec<Arc<dyn Report>> {
        let mut seen = HashSet::new();
        let mut visible: Vec<Arc<dyn Report>> = reports
            .into_iter()
            .filter(|r| self.is_visible(user, r.as_ref()))
            .filter(|r| seen.insert(r.id().clone()))
            .collect();
        // Stable: equal display orders keep insertion order
        visible.sort_by_key(|r| r.descriptor().display_order);
        visible
    }
}
