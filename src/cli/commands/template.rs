//! `hretl template` command - Print the expected CSV layout of a record type

use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::helpers::{escape_csv, print_structured, print_table, CliContext};
use crate::core::{Config, RecordType};
use crate::etl::stage;

#[derive(clap::Args, Debug)]
pub struct TemplateArgs {
    /// Record type (department, designation, employee, project, project_allocation, timesheet)
    pub record_type: RecordType,

    /// Print the header only, without the example row
    #[arg(long)]
    pub no_example: bool,
}

#[derive(Serialize)]
struct ColumnRow {
    column: &'static str,
    required: bool,
    example: String,
}

pub fn run(args: TemplateArgs, global: &GlobalOpts) -> Result<()> {
    let stage = stage(args.record_type);
    // Dates follow the workspace's date_format; a workspace is optional
    let config = match CliContext::load(global) {
        Ok(ctx) => ctx.config,
        Err(_) => Config::load(None),
    };
    let example_row = stage.example_row(config.date_format());

    match global.format {
        OutputFormat::Auto | OutputFormat::Csv => {
            // Output to stdout (can be redirected to file)
            println!("{}", stage.column_names().join(","));
            if !args.no_example {
                let example: Vec<String> = example_row.iter().map(|v| escape_csv(v)).collect();
                println!("{}", example.join(","));
            }

            if !global.quiet {
                // Usage hint on stderr so it doesn't interfere with redirected output
                eprintln!();
                eprintln!(
                    "{} Redirect to a file: hretl template {} > {}.csv",
                    style("→").blue(),
                    args.record_type,
                    args.record_type
                );
            }
        }
        format => {
            let columns: Vec<ColumnRow> = stage
                .columns
                .iter()
                .zip(example_row)
                .map(|(column, example)| ColumnRow {
                    column: column.name,
                    required: column.required,
                    example,
                })
                .collect();
            if print_structured(&columns, format)? {
                return Ok(());
            }

            let rows: Vec<Vec<String>> = columns
                .iter()
                .map(|c| {
                    vec![
                        c.column.to_string(),
                        if c.required { "yes" } else { "no" }.to_string(),
                        c.example.clone(),
                    ]
                })
                .collect();
            print_table(&["Column", "Required", "Example"], &rows, format);
        }
    }
    Ok(())
}
