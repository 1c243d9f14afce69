//! Rendering reports for the terminal

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::args::OutputFormat;
use crate::cli::helpers::truncate_str;
use crate::core::report::Report;

/// Serializable view of a report
#[derive(Debug, Serialize)]
pub struct ReportView {
    pub id: String,
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub inheritable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub display_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl ReportView {
    pub fn of(report: &dyn Report) -> Self {
        let d = report.descriptor();
        Self {
            id: d.id.to_string(),
            name: d.name.clone(),
            key: d.key.clone(),
            report_type: report.type_tag().to_string(),
            container: d.container.to_string(),
            owner: d.owner.as_ref().map(|o| o.to_string()),
            inheritable: d.is_inheritable(),
            category_id: d.category_id,
            display_order: d.display_order,
            description: d.description.clone(),
            properties: d
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            created_by: d.created_by.as_ref().map(|u| u.to_string()),
            modified: d.modified,
        }
    }

    /// One tab-separated line; fields never contain raw tabs or newlines
    fn tsv_row(&self) -> String {
        [
            tsv_field(&self.id),
            tsv_field(&self.name),
            tsv_field(&self.key),
            tsv_field(&self.report_type),
            tsv_field(&self.container),
            Cow::Owned(self.display_order.to_string()),
        ]
        .join("\t")
    }
}

/// Escape backslash, tab and line breaks as `\\`, `\t`, `\n` and `\r`
fn tsv_field(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '\t', '\n', '\r']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}

/// Print a list of reports
pub fn print_list(reports: &[Arc<dyn Report>], format: OutputFormat) -> Result<()> {
    let views: Vec<ReportView> = reports.iter().map(|r| ReportView::of(r.as_ref())).collect();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&views).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&views).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            println!("ID\tNAME\tKEY\tTYPE\tCONTAINER\tORDER");
            for v in &views {
                println!("{}", v.tsv_row());
            }
        }
        OutputFormat::Id => {
            for v in &views {
                println!("{}", v.id);
            }
        }
        OutputFormat::Md | OutputFormat::Auto => {
            let mut builder = Builder::default();
            builder.push_record(["ID", "Name", "Key", "Type", "Container", "Order"]);
            for v in &views {
                let name = truncate_str(&v.name, 40);
                let order = v.display_order.to_string();
                builder.push_record([
                    v.id.as_str(),
                    name.as_str(),
                    v.key.as_str(),
                    v.report_type.as_str(),
                    v.container.as_str(),
                    order.as_str(),
                ]);
            }
            let mut table = builder.build();
            if format == OutputFormat::Md {
                table.with(Style::markdown());
            } else {
                table.with(Style::rounded());
            }
            println!("{}", table);
        }
    }
    Ok(())
}

/// Print one report
pub fn print_report(report: &dyn Report, format: OutputFormat) -> Result<()> {
    let view = ReportView::of(report);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&view).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", view.id),
        OutputFormat::Tsv => println!("{}", view.tsv_row()),
        OutputFormat::Yaml | OutputFormat::Md | OutputFormat::Auto => {
            print!("{}", serde_yml::to_string(&view).into_diagnostic()?);
        }
    }
    Ok(())
}
