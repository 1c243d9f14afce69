//! Record type stored in the report table

use crate::core::descriptor::ReportDescriptor;
use crate::core::error::Result;
use crate::core::identity::{ContainerId, EntityId};

/// A durable report row
///
/// `row_id` is `None` until the row has been inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub row_id: Option<i64>,
    pub entity_id: EntityId,
    pub container_id: ContainerId,
    pub report_key: String,
    pub flags: i32,
    pub category_id: Option<i64>,
    pub display_order: i32,
    pub descriptor_blob: Vec<u8>,
}

impl ReportRecord {
    /// Build the row for a descriptor
    ///
    /// A descriptor without an entity id gets a fresh one.
    pub fn from_descriptor(descriptor: &ReportDescriptor) -> Result<Self> {
        Ok(Self {
            row_id: descriptor.id.row_id(),
            entity_id: descriptor.entity_id.unwrap_or_default(),
            container_id: descriptor.container.clone(),
            report_key: descriptor.key.clone(),
            flags: descriptor.flags.bits(),
            category_id: descriptor.category_id,
            display_order: descriptor.display_order,
            descriptor_blob: descriptor.to_blob()?,
        })
    }
}
