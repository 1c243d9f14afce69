//! Report descriptors - the serializable identity and configuration of a report

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::identity::{ContainerId, EntityId, ReportId, UserId};

bitflags::bitflags! {
    /// Flags stored with each report row
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReportFlags: i32 {
        /// Visible from descendant containers
        const INHERITABLE = 1 << 0;
    }
}

/// Default descriptor type tag for database reports
pub const DEFAULT_DESCRIPTOR_TYPE: &str = "reportDescriptor";

/// Descriptor type tag for reports defined by module files
pub const MODULE_DESCRIPTOR_TYPE: &str = "moduleReportDescriptor";

/// In-memory descriptor of a report
///
/// The row id, container, key, flags, category and display order are stored
/// as columns of the report table and always win over the serialized blob
/// when a record is decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDescriptor {
    /// Tag resolved through the descriptor type registry
    #[serde(default = "default_descriptor_type")]
    pub descriptor_type: String,

    #[serde(skip)]
    pub id: ReportId,

    #[serde(skip)]
    pub entity_id: Option<EntityId>,

    /// Tag resolved through the report type registry
    pub report_type: String,

    #[serde(rename = "reportKey", default)]
    pub key: String,

    #[serde(rename = "reportName")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip, default = "ContainerId::root")]
    pub container: ContainerId,

    /// `None` means the report is shared
    #[serde(default)]
    pub owner: Option<UserId>,

    #[serde(skip)]
    pub flags: ReportFlags,

    #[serde(skip)]
    pub category_id: Option<i64>,

    #[serde(skip)]
    pub display_order: i32,

    #[serde(default)]
    pub properties: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

fn default_descriptor_type() -> String {
    DEFAULT_DESCRIPTOR_TYPE.to_string()
}

impl ReportDescriptor {
    /// Create an unsaved descriptor of the given types
    pub fn new(descriptor_type: impl Into<String>, report_type: impl Into<String>) -> Self {
        Self {
            descriptor_type: descriptor_type.into(),
            id: ReportId::Transient,
            entity_id: None,
            report_type: report_type.into(),
            key: String::new(),
            name: String::new(),
            description: None,
            container: ContainerId::root(),
            owner: None,
            flags: ReportFlags::empty(),
            category_id: None,
            display_order: 0,
            properties: IndexMap::new(),
            created_by: None,
            modified_by: None,
            created: None,
            modified: None,
        }
    }

    pub fn is_inheritable(&self) -> bool {
        self.flags.contains(ReportFlags::INHERITABLE)
    }

    pub fn set_inheritable(&mut self, inheritable: bool) {
        self.flags.set(ReportFlags::INHERITABLE, inheritable);
    }

    /// A report without an owner is visible to everyone with read access
    pub fn is_shared(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_module_based(&self) -> bool {
        self.id.is_module()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Serialize to the blob stored in the report table
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Read the descriptor type tag embedded in a blob
    pub fn blob_type(blob: &[u8]) -> Result<Option<String>> {
        let value: serde_json::Value = serde_json::from_slice(blob)?;
        Ok(value
            .get("descriptorType")
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    /// Overlay the serialized fields of `stored` onto this descriptor
    ///
    /// `self` is usually a fresh instance from the descriptor registry, so its
    /// default properties survive unless the stored blob overrides them.
    pub fn apply_stored(&mut self, stored: ReportDescriptor) {
        self.report_type = stored.report_type;
        self.name = stored.name;
        self.description = stored.description;
        self.owner = stored.owner;
        for (name, value) in stored.properties {
            self.properties.insert(name, value);
        }
        self.created_by = stored.created_by;
        self.modified_by = stored.modified_by;
        self.created = stored.created;
        self.modified = stored.modified;
        if !stored.key.is_empty() {
            self.key = stored.key;
        }
    }
}
