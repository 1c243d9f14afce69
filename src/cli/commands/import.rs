//! `rpt import` command - Save a report described by a YAML file
//!
//! The file names the report type and the fields of its descriptor:
//!
//! ```yaml
//! type: ReportService.linkReport
//! name: Study home
//! key: study/demog
//! inheritable: true
//! properties:
//!   url: /study/home
//! roles:
//!   - user: alice
//!     role: reader
//! ```

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use indexmap::IndexMap;
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::Session;
use crate::cli::output::print_report;
use crate::core::identity::UserId;
use crate::core::security::RoleAssignment;
use crate::core::service::SaveOptions;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Report definition file
    pub file: PathBuf,

    /// Skip permission checks
    #[arg(long)]
    pub skip_validation: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ImportFile {
    #[serde(rename = "type")]
    report_type: String,
    name: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    description: Option<String>,
    /// Private to this user; shared when absent
    #[serde(default)]
    owner: Option<UserId>,
    #[serde(default)]
    inheritable: bool,
    #[serde(default)]
    category_id: Option<i64>,
    #[serde(default)]
    display_order: i32,
    #[serde(default)]
    properties: IndexMap<String, String>,
    #[serde(default)]
    roles: Vec<RoleAssignment>,
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let contents = fs::read_to_string(&args.file).into_diagnostic()?;
    let file: ImportFile = serde_yml::from_str(&contents)
        .map_err(|e| miette::miette!("{}: {}", args.file.display(), e))?;

    let session = Session::open(global)?;
    let Some(mut report) = session.service.create_report_instance(&file.report_type)? else {
        return Err(miette::miette!("Unknown report type '{}'", file.report_type));
    };

    let d = report.descriptor_mut();
    d.name = file.name;
    d.key = file.key;
    d.description = file.description;
    d.owner = file.owner;
    d.set_inheritable(file.inheritable);
    d.category_id = file.category_id;
    d.display_order = file.display_order;
    for (name, value) in file.properties {
        d.set_property(name, value);
    }

    let options = SaveOptions {
        skip_validation: args.skip_validation,
        policy: (!file.roles.is_empty()).then_some(file.roles),
    };
    let saved = session
        .service
        .save_report(&session.context(), report.as_ref(), &options)?;

    if global.quiet {
        return Ok(());
    }
    match global.format {
        crate::cli::args::OutputFormat::Auto => {
            println!(
                "{} Imported {} as {}",
                style("✓").green(),
                saved.descriptor().name,
                style(saved.id()).cyan()
            );
            Ok(())
        }
        format => print_report(saved.as_ref(), format),
    }
}
