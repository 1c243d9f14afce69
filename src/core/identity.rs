//! Identity types: containers, users, report ids and entity ids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// A container in the tenancy tree, addressed by its path
///
/// The root container is `/`. Every other container has exactly one parent,
/// obtained by dropping the last path segment. Children of the root are
/// projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    /// The root of the container tree
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse a container path such as `/Project/Folder`
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Path form of the container
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// A project is a direct child of the root
    pub fn is_project(&self) -> bool {
        self.depth() == 1
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Parent container, `None` for the root
    pub fn parent(&self) -> Option<ContainerId> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Strict ancestors, nearest first, ending with the root
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// True if `self` lies strictly below `other`
    pub fn is_descendant_of(&self, other: &ContainerId) -> bool {
        self.ancestors().any(|a| &a == other)
    }

    /// Build a child container path
    pub fn child(&self, name: &str) -> Result<ContainerId, IdParseError> {
        if self.is_root() {
            format!("/{}", name).parse()
        } else {
            format!("{}/{}", self.0, name).parse()
        }
    }

    /// Last path segment, empty for the root
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }
}

/// Iterator over the strict ancestors of a container
pub struct Ancestors {
    next: Option<ContainerId>,
}

impl Iterator for Ancestors {
    type Item = ContainerId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "/" {
            return Ok(Self::root());
        }
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| IdParseError::InvalidContainer(s.to_string()))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() || rest.split('/').any(|seg| seg.trim().is_empty()) {
            return Err(IdParseError::InvalidContainer(s.to_string()));
        }
        Ok(Self(format!("/{}", rest)))
    }
}

impl Serialize for ContainerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContainerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A user of the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Globally unique id of a persisted report row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Ulid);

impl EntityId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| IdParseError::InvalidUlid(s.to_string(), e.to_string()))
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a report
///
/// Textual forms are `db:<rowId>`, `module:<module>/<path>` and `transient`.
/// A bare integer is accepted as a database id when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ReportId {
    /// A row in the report table
    Database(i64),
    /// A file bundled with an installed module
    Module { module: String, path: String },
    /// Not yet saved
    #[default]
    Transient,
}

impl ReportId {
    pub fn module(module: impl Into<String>, path: impl Into<String>) -> Self {
        ReportId::Module {
            module: module.into(),
            path: path.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }

    /// Row id for database reports
    pub fn row_id(&self) -> Option<i64> {
        match self {
            ReportId::Database(row_id) => Some(*row_id),
            _ => None,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, ReportId::Module { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ReportId::Transient)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportId::Database(row_id) => write!(f, "db:{}", row_id),
            ReportId::Module { module, path } => write!(f, "module:{}/{}", module, path),
            ReportId::Transient => write!(f, "transient"),
        }
    }
}

impl FromStr for ReportId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "transient" {
            return Ok(ReportId::Transient);
        }
        if let Ok(row_id) = s.parse::<i64>() {
            return Ok(ReportId::Database(row_id));
        }

        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| IdParseError::InvalidReportId(s.to_string()))?;

        match scheme {
            "db" => rest
                .parse::<i64>()
                .map(ReportId::Database)
                .map_err(|_| IdParseError::InvalidReportId(s.to_string())),
            "module" => match rest.split_once('/') {
                Some((module, path)) if !module.is_empty() && !path.is_empty() => {
                    Ok(ReportId::module(module, path))
                }
                _ => Err(IdParseError::InvalidReportId(s.to_string())),
            },
            _ => Err(IdParseError::InvalidReportId(s.to_string())),
        }
    }
}

impl Serialize for ReportId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing identifiers
#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid container path: '{0}' (expected '/' or '/Project/Folder')")]
    InvalidContainer(String),

    #[error("invalid report id: '{0}' (expected 'db:<rowId>' or 'module:<module>/<path>')")]
    InvalidReportId(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}
