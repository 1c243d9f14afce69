//! Type registries - construct reports and descriptors from their type tags
//!
//! Every place that needs a report or descriptor instance by type name goes
//! through a [`TypeRegistry`]. Registration happens during start-up through
//! `&mut self`; once the registries are shared they are read without locks.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::core::descriptor::{
    ReportDescriptor, ReportFlags, DEFAULT_DESCRIPTOR_TYPE, MODULE_DESCRIPTOR_TYPE,
};
use crate::core::error::{ReportError, Result};
use crate::core::identity::ReportId;
use crate::core::report::{Report, ReportKind, StandardReport};
use crate::core::store::ReportRecord;

/// Constructor stored under a type tag
pub type Factory<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// Map from type tag to constructor
pub struct TypeRegistry<T> {
    kind: &'static str,
    factories: HashMap<String, Factory<T>>,
}

impl<T> TypeRegistry<T> {
    /// Create an empty registry; `kind` names it in log output
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `tag`
    ///
    /// The first registration of a tag wins. A duplicate is logged and
    /// ignored; returns whether the factory was stored.
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.factories.contains_key(&tag) {
            warn!(registry = self.kind, %tag, "type already registered, keeping the existing factory");
            return false;
        }
        debug!(registry = self.kind, %tag, "registered type");
        self.factories.insert(tag, Box::new(factory));
        true
    }

    /// Construct an instance of `tag`
    ///
    /// Unknown tags yield `Ok(None)`. A failing constructor is an error.
    pub fn create(&self, tag: &str) -> Result<Option<T>> {
        match self.factories.get(tag) {
            Some(factory) => factory().map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<T> fmt::Debug for TypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("kind", &self.kind)
            .field("tags", &self.tags())
            .finish()
    }
}

pub type ReportTypes = TypeRegistry<Box<dyn Report>>;
pub type DescriptorTypes = TypeRegistry<ReportDescriptor>;

/// The report and descriptor registries used by the engine
#[derive(Debug)]
pub struct Registries {
    pub reports: ReportTypes,
    pub descriptors: DescriptorTypes,
}

impl Registries {
    /// Empty registries
    pub fn empty() -> Self {
        Self {
            reports: TypeRegistry::new("report"),
            descriptors: TypeRegistry::new("descriptor"),
        }
    }

    /// Registries holding every built-in report kind and descriptor type
    pub fn builtin() -> Self {
        let mut registries = Self::empty();

        for kind in ReportKind::all() {
            let kind = *kind;
            registries.reports.register(kind.type_tag(), move || {
                Ok(Box::new(StandardReport::new(kind)) as Box<dyn Report>)
            });
        }

        for tag in [
            DEFAULT_DESCRIPTOR_TYPE,
            MODULE_DESCRIPTOR_TYPE,
            "queryReportDescriptor",
        ] {
            registries
                .descriptors
                .register(tag, move || Ok(ReportDescriptor::new(tag, "")));
        }
        registries.descriptors.register("rReportDescriptor", || {
            let mut d = ReportDescriptor::new("rReportDescriptor", "");
            d.set_property("scriptExtension", ".r");
            Ok(d)
        });
        registries.descriptors.register("jsReportDescriptor", || {
            let mut d = ReportDescriptor::new("jsReportDescriptor", "");
            d.set_property("scriptExtension", ".js");
            Ok(d)
        });

        registries
    }

    /// A new, empty report of type `tag`
    pub fn create_report(&self, tag: &str) -> Result<Option<Box<dyn Report>>> {
        self.reports.create(tag)
    }

    /// Wrap `descriptor` in a report of its report type
    ///
    /// Returns `Ok(None)` when the report type is not registered.
    pub fn instantiate(&self, descriptor: ReportDescriptor) -> Result<Option<Box<dyn Report>>> {
        let Some(mut report) = self.reports.create(&descriptor.report_type)? else {
            return Ok(None);
        };
        *report.descriptor_mut() = descriptor;
        Ok(Some(report))
    }

    /// Rebuild the report stored in `record`
    ///
    /// Any unknown type tag is an error: a record that cannot be rebuilt must
    /// fail the caller rather than silently disappear.
    pub fn decode_record(&self, record: &ReportRecord) -> Result<Box<dyn Report>> {
        let build_error = |message: String| ReportError::Build {
            container: record.container_id.clone(),
            message,
        };

        let descriptor_type = ReportDescriptor::blob_type(&record.descriptor_blob)?
            .unwrap_or_else(|| DEFAULT_DESCRIPTOR_TYPE.to_string());

        let mut descriptor = self.descriptors.create(&descriptor_type)?.ok_or_else(|| {
            build_error(format!(
                "row {:?}: unknown descriptor type '{}'",
                record.row_id, descriptor_type
            ))
        })?;

        let stored: ReportDescriptor = serde_json::from_slice(&record.descriptor_blob)?;
        descriptor.apply_stored(stored);
        descriptor.descriptor_type = descriptor_type;
        descriptor.id = record
            .row_id
            .map(ReportId::Database)
            .unwrap_or(ReportId::Transient);
        descriptor.entity_id = Some(record.entity_id);
        descriptor.container = record.container_id.clone();
        descriptor.key = record.report_key.clone();
        descriptor.flags = ReportFlags::from_bits_retain(record.flags);
        descriptor.category_id = record.category_id;
        descriptor.display_order = record.display_order;

        let report_type = descriptor.report_type.clone();
        self.instantiate(descriptor)?.ok_or_else(|| {
            build_error(format!(
                "row {:?}: unknown report type '{}'",
                record.row_id, report_type
            ))
        })
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::builtin()
    }
}
