//! `hretl ingest` command - Run one batch through the pipeline

use console::style;
use miette::{IntoDiagnostic, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::helpers::{print_structured, print_table, truncate_str, CliContext};
use crate::core::{Classification, ClassifiedFile};
use crate::db::{ledger, SqliteActivityLog, UploadStatus};
use crate::etl::{BatchReport, Pipeline, PipelineOptions};

#[derive(clap::Args, Debug)]
pub struct IngestArgs {
    /// CSV files to ingest
    pub files: Vec<PathBuf>,

    /// Also ingest every .csv file in this directory
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Read files in place instead of archiving a copy into the upload folder
    #[arg(long)]
    pub no_archive: bool,
}

pub fn run(args: IngestArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = CliContext::load(global)?;

    let mut paths = args.files.clone();
    if let Some(ref dir) = args.dir {
        paths.extend(csv_files_in(dir)?);
    }
    if paths.is_empty() {
        return Err(miette::miette!(
            "No input files. Usage: hretl ingest <FILES>... or hretl ingest --dir <DIR>"
        ));
    }
    for path in &paths {
        if !path.is_file() {
            return Err(miette::miette!("File not found: {}", path.display()));
        }
    }

    let mut batch = ctx.config.classifier().classify(&paths);
    if !args.no_archive {
        let folder = ctx.config.upload_folder(&ctx.workspace);
        batch = archive(batch, &folder)?;
    }

    let db = ctx.database()?;
    let activity = SqliteActivityLog::new(db.clone());
    let options = PipelineOptions {
        user: ctx.config.user(),
        date_format: ctx.config.date_format().to_string(),
    };

    if !global.quiet && global.format == OutputFormat::Auto {
        println!(
            "{} Processing {} file(s)...",
            style("→").blue(),
            batch.recognized.len()
        );
    }

    let report = Pipeline::new(&db, &activity, options).run(batch);

    if !print_structured(&report, global.format)? {
        print_report(&report, global);
    }

    if report.success {
        Ok(())
    } else {
        Err(miette::miette!("Ingest failed: {}", report.message))
    }
}

/// `.csv` files directly inside a directory, sorted by name
fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.into_diagnostic()?;
        let is_csv = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if entry.file_type().is_file() && is_csv {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Copy recognized files into a fresh run folder under the upload folder as
/// `<record_type>_<file name>`. Repeated names get a numeric suffix.
fn archive(batch: Classification, folder: &Path) -> Result<Classification> {
    let run_folder = folder.join(ledger::new_id());
    fs::create_dir_all(&run_folder).into_diagnostic()?;

    let mut taken = HashSet::new();
    let recognized = batch
        .recognized
        .into_iter()
        .map(|file| {
            let dest = run_folder.join(archive_name(&file, &mut taken));
            fs::copy(&file.path, &dest).map_err(|e| {
                miette::miette!("Failed to archive {}: {}", file.path.display(), e)
            })?;
            tracing::debug!(from = %file.path.display(), to = %dest.display(), "archived");
            Ok(file.relocated(dest))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Classification {
        recognized,
        unrecognized: batch.unrecognized,
    })
}

fn archive_name(file: &ClassifiedFile, taken: &mut HashSet<String>) -> String {
    let base = format!("{}_{}", file.record_type, file.file_name());
    let mut name = base.clone();
    let mut n = 1;
    while !taken.insert(name.clone()) {
        n += 1;
        name = format!("{}_{}", n, base);
    }
    name
}

fn print_report(report: &BatchReport, global: &GlobalOpts) {
    let rows: Vec<Vec<String>> = report
        .files
        .iter()
        .map(|f| {
            vec![
                f.upload_id.clone().unwrap_or_else(|| "-".to_string()),
                f.record_type.to_string(),
                truncate_str(&f.file_name, 40),
                f.status.to_string(),
                f.records_processed.to_string(),
                f.records_success.to_string(),
                f.records_failed.to_string(),
            ]
        })
        .collect();
    print_table(
        &["Upload", "Type", "File", "Status", "Processed", "Loaded", "Rejected"],
        &rows,
        global.format,
    );

    if global.format != OutputFormat::Auto {
        return;
    }

    for f in &report.files {
        if let (Some(message), UploadStatus::Failed) = (&f.message, f.status) {
            println!("  {} {}: {}", style("✗").red(), f.file_name, message);
        }
    }

    let errors: Vec<String> = report
        .stats
        .validation_errors
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(rt, count)| format!("{} {}", rt, count))
        .collect();
    if !errors.is_empty() {
        println!(
            "  Validation errors: {}",
            style(errors.join(", ")).yellow()
        );
        println!(
            "  Inspect with {}",
            style("hretl uploads errors <UPLOAD_ID>").yellow()
        );
    }

    for miss in &report.unrecognized {
        println!(
            "  {} Skipped unrecognized file {}",
            style("!").yellow(),
            style(&miss.file_name).dim()
        );
    }
    for skipped in &report.not_attempted {
        println!(
            "  {} Not attempted: {} ({})",
            style("!").yellow(),
            skipped.file_name,
            skipped.record_type
        );
    }

    println!();
    println!(
        "  Records: {} processed, {} loaded, {} rejected",
        style(report.stats.records_processed).cyan(),
        style(report.stats.records_success).green(),
        style(report.stats.records_failed).red()
    );
    if report.success {
        println!("{} {}", style("✓").green().bold(), report.message);
    }
}
