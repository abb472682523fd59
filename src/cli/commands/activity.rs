//! `hretl activity` command - Query the activity log

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::{print_structured, print_table, truncate_str, CliContext};
use crate::db::{activity, ConnectionProvider};

#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// List activity entries, newest first
    List {
        /// Only show one event type (FILE_UPLOAD, FILE_PROCESSING)
        #[arg(long)]
        event_type: Option<String>,

        /// Number of entries to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,

        /// Number of entries to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show activity totals by event type and by day
    Stats,
}

pub fn run(cmd: ActivityCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ActivityCommands::List {
            event_type,
            limit,
            offset,
        } => run_list(event_type, limit, offset, global),
        ActivityCommands::Stats => run_stats(global),
    }
}

fn run_list(
    event_type: Option<String>,
    limit: usize,
    offset: usize,
    global: &GlobalOpts,
) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.database()?;
    let conn = db.connection()?;
    let event_type = event_type.map(|t| t.to_uppercase());
    let entries =
        activity::list_logs(&conn, event_type.as_deref(), limit, offset).into_diagnostic()?;

    if print_structured(&entries, global.format)? {
        return Ok(());
    }

    if entries.is_empty() {
        if !global.quiet {
            println!("No activity recorded.");
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.event_type.clone(),
                e.user.clone().unwrap_or_default(),
                truncate_str(&e.description, 60),
            ]
        })
        .collect();
    print_table(&["Timestamp (UTC)", "Event", "User", "Description"], &rows, global.format);
    Ok(())
}

fn run_stats(global: &GlobalOpts) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.database()?;
    let conn = db.connection()?;
    let stats = activity::log_stats(&conn).into_diagnostic()?;

    if print_structured(&stats, global.format)? {
        return Ok(());
    }

    println!("{}", style("Activity Log").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Total events: {}", style(stats.total).cyan());

    if !stats.by_event_type.is_empty() {
        println!();
        println!("  {}", style("By Event Type:").bold());
        for (event_type, count) in &stats.by_event_type {
            println!("    {:<18} {}", event_type, count);
        }
    }

    if !stats.by_day.is_empty() {
        println!();
        println!("  {}", style("Recent Days:").bold());
        for (day, count) in &stats.by_day {
            println!("    {:<18} {}", day, count);
        }
    }
    Ok(())
}
