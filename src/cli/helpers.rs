//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::core::{Config, Workspace};
use crate::db::Database;

/// Workspace and configuration resolved for one command
pub struct CliContext {
    pub workspace: Workspace,
    pub config: Config,
}

impl CliContext {
    /// Discover the workspace (honouring `--workspace`) and load its config
    pub fn load(global: &GlobalOpts) -> Result<Self> {
        let workspace = match global.workspace {
            Some(ref root) => Workspace::discover_from(root)?,
            None => Workspace::discover()?,
        };
        let config = Config::load(Some(&workspace));
        Ok(Self { workspace, config })
    }

    /// Open the configured database
    pub fn database(&self) -> Result<Database> {
        let path = self.config.database_path(&self.workspace);
        Ok(Database::open(&path, self.config.pool_size())?)
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Print a value as JSON or YAML. Returns false for tabular formats.
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Print rows in the requested tabular format
pub fn print_table(header: &[&str], rows: &[Vec<String>], format: OutputFormat) {
    match format {
        OutputFormat::Tsv => {
            println!("{}", header.join("\t"));
            for row in rows {
                println!("{}", row.join("\t"));
            }
        }
        OutputFormat::Csv => {
            println!("{}", header.join(","));
            for row in rows {
                let escaped: Vec<String> = row.iter().map(|v| escape_csv(v)).collect();
                println!("{}", escaped.join(","));
            }
        }
        _ => {
            let mut builder = Builder::default();
            builder.push_record(header.iter().copied());
            for row in rows {
                builder.push_record(row.iter().map(String::as_str));
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("café au lait", 7), "café...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }
}
