//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    category::CategoryDeletedArgs, delete::DeleteArgs, import::ImportArgs, list::ListArgs,
    order::OrderArgs, show::ShowArgs,
};

#[derive(Parser)]
#[command(name = "rpt")]
#[command(author, version, about = "Saved report resolution and storage")]
#[command(long_about = "Resolve, import and maintain saved reports across a hierarchy of containers.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Configuration file layered over the global one
    #[arg(long, global = true, env = "RPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Acting user (default: from configuration; none acts as the system)
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Container to operate in
    #[arg(long, short = 'c', global = true, default_value = "/")]
    pub container: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List reports visible in a container
    List(ListArgs),

    /// Show a single report
    Show(ShowArgs),

    /// Save a report described by a YAML file
    Import(ImportArgs),

    /// Delete a saved report
    Delete(DeleteArgs),

    /// Change the display order of a saved report
    Order(OrderArgs),

    /// Clear a deleted category from every report in the container
    CategoryDeleted(CategoryDeletedArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table for lists, YAML for single reports
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
