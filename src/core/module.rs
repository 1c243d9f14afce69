//! Module-bundled report files
//!
//! Installed modules may ship report definitions as YAML files laid out as
//! `<modules_dir>/<module>/reports/<key>/<name>.report.yaml`. The key is the
//! directory path below `reports/`, so `reports/study/demog/x.report.yaml`
//! is a report under key `study/demog`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use moka::sync::Cache;
use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::descriptor::{ReportDescriptor, MODULE_DESCRIPTOR_TYPE};
use crate::core::error::{ReportError, Result};
use crate::core::identity::{ContainerId, ReportId};

/// Directory inside a module that holds report files
pub const REPORTS_DIR: &str = "reports";

/// File suffix of a module report definition
pub const REPORT_FILE_SUFFIX: &str = ".report.yaml";

/// Raw report definition shipped with a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedDescriptor {
    pub module: String,
    /// Path relative to the module directory, always `/`-separated
    pub path: String,
    pub content: String,
}

impl SerializedDescriptor {
    /// Report key encoded in the path (`reports/<key>/<file>`)
    pub fn key(&self) -> String {
        let rest = self
            .path
            .strip_prefix(REPORTS_DIR)
            .and_then(|p| p.strip_prefix('/'))
            .unwrap_or(&self.path);
        match rest.rsplit_once('/') {
            Some((key, _)) => key.to_string(),
            None => String::new(),
        }
    }

    /// Parse into a descriptor owned by `container`
    pub fn parse(&self, container: &ContainerId) -> Result<ReportDescriptor> {
        let file: ModuleReportFile =
            serde_yml::from_str(&self.content).map_err(|e| ReportError::ModuleDescriptor {
                path: format!("{}/{}", self.module, self.path),
                message: e.to_string(),
            })?;

        let mut d = ReportDescriptor::new(MODULE_DESCRIPTOR_TYPE, file.report_type);
        d.id = ReportId::module(&self.module, &self.path);
        d.key = self.key();
        d.name = file.name.unwrap_or_else(|| self.file_stem().to_string());
        d.description = file.description;
        d.container = container.clone();
        d.display_order = file.display_order;
        d.properties = file.properties;
        Ok(d)
    }

    fn file_stem(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.strip_suffix(REPORT_FILE_SUFFIX).unwrap_or(file)
    }
}

/// On-disk shape of a `.report.yaml` file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleReportFile {
    report_type: String,
    /// Defaults to the file name without its suffix
    #[serde(default, rename = "reportName")]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    display_order: i32,
    #[serde(default)]
    properties: IndexMap<String, String>,
}

/// Supplies module-bundled report definitions
///
/// Implementations must be free of side effects; results are treated as
/// authoritative for the module and key at the time of the call.
pub trait ModuleDescriptorSource: Send + Sync {
    /// Definitions for `module`, all of them or only those under `key`
    fn get_descriptors(&self, module: &str, key: Option<&str>) -> Result<Vec<SerializedDescriptor>>;
}

/// Source for deployments without module report files
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModuleReports;

impl ModuleDescriptorSource for NoModuleReports {
    fn get_descriptors(&self, _module: &str, _key: Option<&str>) -> Result<Vec<SerializedDescriptor>> {
        Ok(Vec::new())
    }
}

type ModuleCacheKey = (String, Option<String>);

/// Reads module report files from a directory tree, caching per module and key
pub struct FileModuleSource {
    root: PathBuf,
    cache: Cache<ModuleCacheKey, Arc<Vec<SerializedDescriptor>>>,
}

impl FileModuleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Cache::builder().max_capacity(1_000).build(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Forget everything cached for `module` after its files changed
    pub fn invalidate(&self, module: &str) {
        self.cache.run_pending_tasks();
        let stale: Vec<ModuleCacheKey> = self
            .cache
            .iter()
            .filter(|(k, _)| k.0 == module)
            .map(|(k, _)| k.as_ref().clone())
            .collect();
        for key in stale {
            self.cache.invalidate(&key);
        }
        debug!(module, "invalidated module report files");
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    fn scan(&self, module: &str, key: Option<&str>) -> Result<Vec<SerializedDescriptor>> {
        if module.is_empty() || module.contains(['/', '\\']) || module.starts_with('.') {
            return Err(ReportError::ModuleDescriptor {
                path: module.to_string(),
                message: "invalid module name".to_string(),
            });
        }

        let module_dir = self.root.join(module);
        let reports_dir = module_dir.join(REPORTS_DIR);
        if !reports_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&reports_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(REPORT_FILE_SUFFIX));
            if !is_report {
                continue;
            }

            let Ok(relative) = path.strip_prefix(&module_dir) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let descriptor = SerializedDescriptor {
                module: module.to_string(),
                path: relative,
                content: String::new(),
            };
            if key.is_some_and(|k| descriptor.key() != k) {
                continue;
            }

            found.push(SerializedDescriptor {
                content: fs::read_to_string(path)?,
                ..descriptor
            });
        }

        debug!(module, key, files = found.len(), "scanned module report files");
        Ok(found)
    }
}

impl ModuleDescriptorSource for FileModuleSource {
    fn get_descriptors(&self, module: &str, key: Option<&str>) -> Result<Vec<SerializedDescriptor>> {
        let cache_key = (module.to_string(), key.map(String::from));
        let found = self
            .cache
            .try_get_with(cache_key, || self.scan(module, key).map(Arc::new))
            .map_err(|e| ReportError::ModuleDescriptor {
                path: module.to_string(),
                message: e.to_string(),
            })?;
        Ok(found.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const QUERY_REPORT: &str = "reportType: ReportService.queryReport\n\
        reportName: Enrollment\n\
        displayOrder: 2\n\
        properties:\n  schemaName: study\n  queryName: Enrollment\n";

    #[test]
    fn test_key_from_path() {
        let d = SerializedDescriptor {
            module: "study".to_string(),
            path: "reports/study/demog/enrollment.report.yaml".to_string(),
            content: String::new(),
        };
        assert_eq!(d.key(), "study/demog");
        assert_eq!(d.file_stem(), "enrollment");

        let top = SerializedDescriptor {
            path: "reports/top.report.yaml".to_string(),
            ..d
        };
        assert_eq!(top.key(), "");
    }

    #[test]
    fn test_parse() {
        let d = SerializedDescriptor {
            module: "study".to_string(),
            path: "reports/study/demog/enrollment.report.yaml".to_string(),
            content: QUERY_REPORT.to_string(),
        };
        let container = ContainerId::parse("/P1").unwrap();
        let parsed = d.parse(&container).unwrap();

        assert_eq!(parsed.id, ReportId::module("study", "reports/study/demog/enrollment.report.yaml"));
        assert!(parsed.is_module_based());
        assert_eq!(parsed.name, "Enrollment");
        assert_eq!(parsed.key, "study/demog");
        assert_eq!(parsed.display_order, 2);
        assert_eq!(parsed.property("queryName"), Some("Enrollment"));
        assert_eq!(parsed.container, container);
    }

    #[test]
    fn test_parse_error_names_file() {
        let d = SerializedDescriptor {
            module: "study".to_string(),
            path: "reports/broken.report.yaml".to_string(),
            content: "reportName: [unterminated".to_string(),
        };
        let err = d.parse(&ContainerId::root()).unwrap_err();
        assert!(err.to_string().contains("study/reports/broken.report.yaml"));
    }

    #[test]
    fn test_file_source_filters_by_key() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "study/reports/study/demog/b.report.yaml", QUERY_REPORT);
        write(tmp.path(), "study/reports/study/demog/a.report.yaml", QUERY_REPORT);
        write(tmp.path(), "study/reports/other/c.report.yaml", QUERY_REPORT);
        write(tmp.path(), "study/reports/study/demog/notes.txt", "ignored");

        let source = FileModuleSource::new(tmp.path());
        let all = source.get_descriptors("study", None).unwrap();
        assert_eq!(all.len(), 3);

        let demog = source.get_descriptors("study", Some("study/demog")).unwrap();
        let paths: Vec<&str> = demog.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "reports/study/demog/a.report.yaml",
                "reports/study/demog/b.report.yaml"
            ]
        );
        assert!(source.get_descriptors("missing", None).unwrap().is_empty());
    }

    #[test]
    fn test_file_source_caches_until_invalidated() {
        let tmp = tempdir().unwrap();
        write(tmp.path(), "study/reports/k/a.report.yaml", QUERY_REPORT);

        let source = FileModuleSource::new(tmp.path());
        assert_eq!(source.get_descriptors("study", Some("k")).unwrap().len(), 1);

        write(tmp.path(), "study/reports/k/b.report.yaml", QUERY_REPORT);
        assert_eq!(source.get_descriptors("study", Some("k")).unwrap().len(), 1);

        source.invalidate("study");
        assert_eq!(source.get_descriptors("study", Some("k")).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_path_like_module_names() {
        let tmp = tempdir().unwrap();
        let source = FileModuleSource::new(tmp.path());
        assert!(source.get_descriptors("../etc", None).is_err());
    }
}
