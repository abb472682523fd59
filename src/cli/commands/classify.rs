//! `hretl classify` command - Dry-run the file classifier

use console::style;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::{print_structured, print_table, CliContext};
use crate::core::{Classifier, Config};

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    /// File names or paths to classify (files need not exist)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ClassifyRow {
    file_name: String,
    record_type: Option<String>,
}

pub fn run(args: ClassifyArgs, global: &GlobalOpts) -> Result<()> {
    // Classification only needs the config; a workspace is optional
    let classifier: Classifier = match CliContext::load(global) {
        Ok(ctx) => ctx.config.classifier(),
        Err(_) => Config::load(None).classifier(),
    };

    let rows: Vec<ClassifyRow> = args
        .files
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            ClassifyRow {
                record_type: classifier
                    .classify_name(&file_name)
                    .map(|rt| rt.as_str().to_string()),
                file_name,
            }
        })
        .collect();

    if print_structured(&rows, global.format)? {
        return Ok(());
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.file_name.clone(),
                r.record_type.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["File", "Record Type"], &table, global.format);

    let unrecognized = rows.iter().filter(|r| r.record_type.is_none()).count();
    if unrecognized > 0 && !global.quiet {
        eprintln!(
            "{} {} file(s) match no configured fragment and would be skipped",
            style("!").yellow(),
            unrecognized
        );
    }
    Ok(())
}
