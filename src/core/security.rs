//! Permission checks and security policy storage
//!
//! The engine only asks two questions of the security layer: does a user hold
//! a permission in a container, and store/remove the role assignments attached
//! to a report. `RoleGrants` answers the first in process. `StoredPolicies`
//! keeps report assignments in the record store, inside the write
//! transaction.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::error::{ReportError, Result};
use crate::core::identity::{ContainerId, ReportId, UserId};
use crate::core::store::StoreTransaction;

/// Permissions the engine checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Insert,
    Update,
    Delete,
    /// Make a report visible to everyone
    Share,
}

/// Container roles, each granting a fixed set of permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Author,
    Editor,
    Admin,
}

impl Role {
    pub fn grants(&self, permission: Permission) -> bool {
        match self {
            Role::Reader => permission == Permission::Read,
            Role::Author => matches!(permission, Permission::Read | Permission::Insert),
            Role::Editor | Role::Admin => true,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Reader => write!(f, "reader"),
            Role::Author => write!(f, "author"),
            Role::Editor => write!(f, "editor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reader" => Ok(Role::Reader),
            "author" => Ok(Role::Author),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A role granted to a user on a single report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user: UserId,
    pub role: Role,
}

/// Answers permission questions for users in containers
pub trait SecurityPolicy: Send + Sync {
    fn has_permission(
        &self,
        user: &UserId,
        container: &ContainerId,
        permission: Permission,
    ) -> bool;
}

/// Stores per-report role assignments
///
/// Both calls run inside the save or delete transaction; writes made through
/// `tx` commit or roll back with the report row.
pub trait SecurityPolicyStore: Send + Sync {
    fn assign(
        &self,
        tx: &StoreTransaction<'_>,
        report: &ReportId,
        assignments: &[RoleAssignment],
    ) -> Result<()>;

    fn delete(&self, tx: &StoreTransaction<'_>, report: &ReportId) -> Result<()>;
}

/// Report role assignments kept in the `report_policies` table
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredPolicies;

impl StoredPolicies {
    fn row_id(report: &ReportId) -> Result<i64> {
        report.row_id().ok_or_else(|| {
            ReportError::Policy(format!("report {} has no stored row to attach a policy to", report))
        })
    }
}

impl SecurityPolicyStore for StoredPolicies {
    fn assign(
        &self,
        tx: &StoreTransaction<'_>,
        report: &ReportId,
        assignments: &[RoleAssignment],
    ) -> Result<()> {
        tx.replace_policy(Self::row_id(report)?, assignments)
    }

    fn delete(&self, tx: &StoreTransaction<'_>, report: &ReportId) -> Result<()> {
        tx.delete_policy(Self::row_id(report)?)?;
        Ok(())
    }
}

/// In-memory grants: site admins plus per-container roles
#[derive(Debug, Default)]
pub struct RoleGrants {
    admins: HashSet<UserId>,
    grants: HashMap<ContainerId, HashMap<UserId, Vec<Role>>>,
}

impl RoleGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Site admins hold every permission everywhere
    pub fn add_admin(&mut self, user: UserId) {
        self.admins.insert(user);
    }

    pub fn grant(&mut self, user: UserId, container: ContainerId, role: Role) {
        let roles = self
            .grants
            .entry(container)
            .or_default()
            .entry(user)
            .or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    pub fn roles(&self, user: &UserId, container: &ContainerId) -> Vec<Role> {
        self.grants
            .get(container)
            .and_then(|users| users.get(user))
            .cloned()
            .unwrap_or_default()
    }
}

impl SecurityPolicy for RoleGrants {
    fn has_permission(
        &self,
        user: &UserId,
        container: &ContainerId,
        permission: Permission,
    ) -> bool {
        if self.admins.contains(user) {
            return true;
        }
        self.grants
            .get(container)
            .and_then(|users| users.get(user))
            .map(|roles| roles.iter().any(|r| r.grants(permission)))
            .unwrap_or(false)
    }
}
