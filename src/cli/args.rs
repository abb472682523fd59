//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    activity::ActivityCommands, classify::ClassifyArgs, ingest::IngestArgs, init::InitArgs,
    template::TemplateArgs, uploads::UploadsCommands,
};

#[derive(Parser)]
#[command(name = "hretl")]
#[command(author, version, about = "HR and timesheet CSV ingest toolkit")]
#[command(
    long_about = "Classify, validate and load HR/timesheet CSV exports into a relational store, \
                  keeping an audit ledger of every upload and every rejected field."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Global options available to all commands
#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Show debug diagnostics on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root directory (default: auto-detect)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workspace
    Init(InitArgs),

    /// Classify, validate and load CSV files as one batch
    Ingest(IngestArgs),

    /// Show which record type each file would be loaded as
    Classify(ClassifyArgs),

    /// Print the expected CSV header for a record type
    Template(TemplateArgs),

    /// Upload history and validation errors
    #[command(subcommand)]
    Uploads(UploadsCommands),

    /// Activity log
    #[command(subcommand)]
    Activity(ActivityCommands),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable tables
    #[default]
    Auto,
    /// JSON format (for programming)
    Json,
    /// YAML format
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}
