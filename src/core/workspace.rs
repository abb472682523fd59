//! Workspace discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the workspace marker directory
pub const WORKSPACE_DIR: &str = ".hretl";

/// Represents an ETL workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the workspace (parent of .hretl/)
    root: PathBuf,
}

impl Workspace {
    /// Find workspace root by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current =
            std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find workspace root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(WORKSPACE_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new workspace structure at the given path
    pub fn init(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(WORKSPACE_DIR).exists() {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        Self::init_force(&root)
    }

    /// Initialize even if .hretl/ exists. The database is left untouched.
    pub fn init_force(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let ws = Self { root };

        std::fs::create_dir_all(ws.uploads_dir())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        std::fs::write(ws.config_path(), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        Ok(ws)
    }

    fn default_config() -> &'static str {
        r#"# HR timesheet ETL workspace configuration

# User recorded in the activity log (default: $USER)
# user: ""

# SQLite database, relative to the workspace root
# database: .hretl/hretl.db

# Where submitted files are archived before processing
# upload_folder: .hretl/uploads

# Date format for all date columns (chrono strftime syntax)
# date_format: "%Y-%m-%d"

# Maximum pooled database connections
# pool_size: 4

# File name fragments, checked in order; the first match wins
# file_types:
#   - { record_type: timesheet, fragment: timesheet }
#   - { record_type: project_allocation, fragment: allocation }
#   - { record_type: designation, fragment: designation }
#   - { record_type: department, fragment: department }
#   - { record_type: employee, fragment: employee }
#   - { record_type: project, fragment: project }
"#
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .hretl directory
    pub fn hretl_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// Get the workspace config file path
    pub fn config_path(&self) -> PathBuf {
        self.hretl_dir().join("config.yaml")
    }

    /// Default archive folder for submitted files
    pub fn uploads_dir(&self) -> PathBuf {
        self.hretl_dir().join("uploads")
    }

    /// Resolve a configured path against the workspace root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error, miette::Diagnostic)]
pub enum WorkspaceError {
    #[error("not an hretl workspace (searched from {searched_from:?})")]
    #[diagnostic(
        code(hretl::workspace::not_found),
        help("run 'hretl init' to create one")
    )]
    NotFound { searched_from: PathBuf },

    #[error("hretl workspace already exists at {0:?}")]
    #[diagnostic(code(hretl::workspace::exists), help("use --force to rewrite the config"))]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    #[diagnostic(code(hretl::workspace::io))]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        assert!(ws.hretl_dir().is_dir());
        assert!(ws.config_path().exists());
        assert!(ws.uploads_dir().is_dir());
    }

    #[test]
    fn test_workspace_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let err = Workspace::init(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_workspace_discover_walks_up() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("exports/2024/march");
        std::fs::create_dir_all(&subdir).unwrap();

        let ws = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(
            ws.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_workspace_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        let abs = tmp.path().join("x.db");
        assert_eq!(ws.resolve(&abs), abs);
        assert_eq!(ws.resolve(Path::new("y.db")), ws.root().join("y.db"));
    }
}
