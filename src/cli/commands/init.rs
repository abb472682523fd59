//! `hretl init` command - Initialize a new workspace

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::cli::args::GlobalOpts;
use crate::core::{Config, Workspace, WorkspaceError};
use crate::db::Database;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Rewrite the config even if .hretl/ already exists (data is kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    let workspace = if args.force {
        Workspace::init_force(&path)
    } else {
        Workspace::init(&path)
    };

    match workspace {
        Ok(workspace) => {
            let config = Config::load(Some(&workspace));
            let db_path = config.database_path(&workspace);
            Database::open(&db_path, 1)?;

            if global.quiet {
                return Ok(());
            }
            println!(
                "{} Initialized hretl workspace at {}",
                style("✓").green(),
                style(workspace.root().display()).cyan()
            );
            println!();
            println!("Created workspace structure:");
            print_structure(workspace.root(), &db_path);
            println!();
            println!("Next steps:");
            println!(
                "  {} Print the expected columns of a file type",
                style("hretl template employee").yellow()
            );
            println!(
                "  {} Load a batch of exports",
                style("hretl ingest *.csv").yellow()
            );
            println!(
                "  {} Review recent uploads",
                style("hretl uploads list").yellow()
            );
            Ok(())
        }
        Err(WorkspaceError::AlreadyExists(path)) => {
            println!(
                "{} hretl workspace already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to rewrite the default config",
                style("hretl init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_structure(root: &Path, db_path: &Path) {
    let entries = [
        root.join(".hretl/config.yaml"),
        root.join(".hretl/uploads"),
        db_path.to_path_buf(),
    ];

    for entry in entries {
        if entry.exists() {
            let shown = entry.strip_prefix(root).unwrap_or(&entry);
            let suffix = if entry.is_dir() { "/" } else { "" };
            println!("  {}{}", style(shown.display()).dim(), suffix);
        }
    }
}
