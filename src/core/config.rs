//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::container::ContainerTree;
use crate::core::error::{ReportError, Result};
use crate::core::identity::{ContainerId, UserId};
use crate::core::security::{Role, RoleGrants};

/// Database value that selects a private in-memory store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Engine configuration with layered hierarchy
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite file holding saved reports (`:memory:` for a scratch store)
    pub database: Option<PathBuf>,

    /// Root directory of module-bundled report files
    pub modules_dir: Option<PathBuf>,

    /// Container consulted after the ancestor walk
    pub shared_container: Option<ContainerId>,

    /// Maximum number of containers kept in the cache
    pub cache_capacity: Option<u64>,

    /// Acting user for CLI commands
    pub user: Option<String>,

    /// Containers and their active modules
    pub containers: Vec<ContainerConfig>,

    /// Per-container role grants
    pub grants: Vec<GrantConfig>,

    /// Users holding every permission everywhere
    pub admins: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub path: ContainerId,
    #[serde(default)]
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantConfig {
    pub user: UserId,
    pub container: ContainerId,
    pub roles: Vec<Role>,
}

impl EngineConfig {
    /// Load configuration from all sources, merging in priority order
    ///
    /// A missing or unreadable global file is ignored. An explicit file
    /// that cannot be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // 1. Built-in defaults (already in Default impl)
        let mut config = EngineConfig::default();

        // 2. Global user config (~/.config/rpt/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Ok(global) = Self::from_file(&global_path) {
                    config.merge(global);
                }
            }
        }

        // 3. Explicit config file
        if let Some(path) = explicit {
            config.merge(Self::from_file(path)?);
        }

        // 4. Environment variables
        config.apply_env(|name| std::env::var(name).ok());

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yml::from_str(&contents)
            .map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database) = lookup("RPT_DATABASE") {
            self.database = Some(PathBuf::from(database));
        }
        if let Some(modules_dir) = lookup("RPT_MODULES_DIR") {
            self.modules_dir = Some(PathBuf::from(modules_dir));
        }
        if let Some(user) = lookup("RPT_USER") {
            self.user = Some(user);
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rpt")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    ///
    /// Scalars are replaced; container, grant and admin lists accumulate.
    fn merge(&mut self, other: EngineConfig) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.modules_dir.is_some() {
            self.modules_dir = other.modules_dir;
        }
        if other.shared_container.is_some() {
            self.shared_container = other.shared_container;
        }
        if other.cache_capacity.is_some() {
            self.cache_capacity = other.cache_capacity;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        self.containers.extend(other.containers);
        self.grants.extend(other.grants);
        self.admins.extend(other.admins);
    }

    /// Database location, falling back to the user data directory
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref database) = self.database {
            return database.clone();
        }
        directories::ProjectDirs::from("", "", "rpt")
            .map(|dirs| dirs.data_dir().join("reports.db"))
            .unwrap_or_else(|| PathBuf::from(".rpt").join("reports.db"))
    }

    pub fn is_in_memory(&self) -> bool {
        self.database
            .as_deref()
            .is_some_and(|p| p.as_os_str() == IN_MEMORY_DATABASE)
    }

    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
            .unwrap_or(crate::core::cache::DEFAULT_CAPACITY)
    }

    /// Acting user, if any is configured
    pub fn user(&self) -> Option<UserId> {
        self.user.as_deref().map(UserId::new)
    }

    pub fn container_tree(&self) -> ContainerTree {
        let mut tree = match &self.shared_container {
            Some(shared) => ContainerTree::new(shared.clone()),
            None => ContainerTree::default(),
        };
        for container in &self.containers {
            tree.set_active_modules(container.path.clone(), container.modules.iter().cloned());
        }
        tree
    }

    pub fn role_grants(&self) -> RoleGrants {
        let mut grants = RoleGrants::new();
        for admin in &self.admins {
            grants.add_admin(admin.clone());
        }
        for grant in &self.grants {
            for role in &grant.roles {
                grants.grant(grant.user.clone(), grant.container.clone(), *role);
            }
        }
        grants
    }
}
