//! Container tree metadata the resolver needs
//!
//! The tree shape itself is carried by [`ContainerId`] paths. What the
//! resolver needs beyond that is the shared fallback container and the
//! modules that are active in each container.

use std::collections::BTreeMap;

use indexmap::IndexSet;

use crate::core::identity::ContainerId;

/// Default path of the shared container
pub const DEFAULT_SHARED_CONTAINER: &str = "/Shared";

#[derive(Debug, Clone)]
pub struct ContainerTree {
    shared: ContainerId,
    active_modules: BTreeMap<ContainerId, Vec<String>>,
}

impl ContainerTree {
    pub fn new(shared: ContainerId) -> Self {
        Self {
            shared,
            active_modules: BTreeMap::new(),
        }
    }

    /// Container consulted after the ancestor walk
    pub fn shared(&self) -> &ContainerId {
        &self.shared
    }

    /// Replace the set of modules active in `container`
    ///
    /// Repeated names are kept once, at their first position.
    pub fn set_active_modules<I, S>(&mut self, container: ContainerId, modules: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules: IndexSet<String> = modules.into_iter().map(Into::into).collect();
        self.active_modules
            .insert(container, modules.into_iter().collect());
    }

    /// Modules active in `container`, in configuration order
    pub fn active_modules(&self, container: &ContainerId) -> &[String] {
        self.active_modules
            .get(container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Containers with explicit configuration, sorted by path
    pub fn containers(&self) -> impl Iterator<Item = &ContainerId> {
        self.active_modules.keys()
    }
}

impl Default for ContainerTree {
    fn default() -> Self {
        Self::new(ContainerId::parse(DEFAULT_SHARED_CONTAINER).unwrap_or_else(|_| ContainerId::root()))
    }
}
