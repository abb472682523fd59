//! `hretl uploads` command - Upload history from the run ledger

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::helpers::{print_structured, print_table, truncate_str, CliContext};
use crate::db::{ledger, ConnectionProvider};

#[derive(Subcommand, Debug)]
pub enum UploadsCommands {
    /// List the most recent uploads, newest first
    List {
        /// Number of uploads to show
        #[arg(long, short = 'n', default_value = "5")]
        limit: usize,
    },

    /// Show one upload and its validation errors
    Errors {
        /// Upload ID (from `hretl uploads list` or `hretl ingest`)
        upload_id: String,
    },
}

pub fn run(cmd: UploadsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        UploadsCommands::List { limit } => run_list(limit, global),
        UploadsCommands::Errors { upload_id } => run_errors(&upload_id, global),
    }
}

fn run_list(limit: usize, global: &GlobalOpts) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.database()?;
    let conn = db.connection()?;
    let uploads = ledger::recent_uploads(&conn, limit).into_diagnostic()?;

    if print_structured(&uploads, global.format)? {
        return Ok(());
    }

    if uploads.is_empty() {
        if !global.quiet {
            println!("No uploads recorded yet.");
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = uploads
        .iter()
        .map(|u| {
            vec![
                u.upload_id.clone(),
                u.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                u.file_type.to_string(),
                truncate_str(&u.file_name, 40),
                u.status.to_string(),
                u.records_processed.to_string(),
                u.records_success.to_string(),
                u.records_failed.to_string(),
            ]
        })
        .collect();
    print_table(
        &[
            "Upload",
            "Timestamp (UTC)",
            "Type",
            "File",
            "Status",
            "Processed",
            "Loaded",
            "Rejected",
        ],
        &rows,
        global.format,
    );
    Ok(())
}

fn run_errors(upload_id: &str, global: &GlobalOpts) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.database()?;
    let conn = db.connection()?;

    let upload = ledger::get_upload(&conn, upload_id)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("Upload not found: {}", upload_id))?;
    let errors = ledger::validation_errors(&conn, upload_id).into_diagnostic()?;

    if print_structured(&errors, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Auto && !global.quiet {
        println!(
            "{} {} ({}) - {}",
            style(&upload.upload_id).bold(),
            upload.file_name,
            upload.file_type,
            upload.status
        );
        if let Some(ref message) = upload.message {
            println!("  {}", style(message).red());
        }
        println!(
            "  {} processed, {} loaded, {} rejected",
            upload.records_processed, upload.records_success, upload.records_failed
        );
        println!();
    }

    if errors.is_empty() {
        if !global.quiet {
            println!("No validation errors recorded for this upload.");
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = errors
        .iter()
        .map(|e| {
            vec![
                e.row_number.to_string(),
                e.field_name.clone(),
                truncate_str(&e.field_value, 30),
                e.error_kind.clone(),
                e.error_message.clone(),
            ]
        })
        .collect();
    print_table(&["Row", "Field", "Value", "Kind", "Message"], &rows, global.format);
    Ok(())
}
