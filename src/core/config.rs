//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::classifier::{default_rules, Classifier, FileTypeRule};
use crate::core::workspace::Workspace;

/// Default date format for every date column
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default maximum number of pooled connections
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// ETL configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User name recorded in the activity log
    pub user: Option<String>,

    /// SQLite database path (relative paths resolve against the workspace root)
    pub database: Option<PathBuf>,

    /// Archive folder for submitted files
    pub upload_folder: Option<PathBuf>,

    /// Date format for date columns
    pub date_format: Option<String>,

    /// Maximum pooled connections
    pub pool_size: Option<u32>,

    /// Classifier priority list
    pub file_types: Option<Vec<FileTypeRule>>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl and accessors)

        // 2. Global user config (~/.config/hretl/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Workspace config (.hretl/config.yaml)
        if let Some(ws) = workspace {
            if let Some(local) = Self::read_file(&ws.config_path()) {
                config.merge(local);
            }
        }

        // 4. Environment variables
        if let Ok(user) = std::env::var("HRETL_USER") {
            config.user = Some(user);
        }
        if let Ok(database) = std::env::var("HRETL_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        config
    }

    /// Parse a config file, ignoring it (with a warning) when unreadable or invalid
    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable config file"
                );
                return None;
            }
        };
        match Self::from_yaml(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Config, serde_yml::Error> {
        // A file with only comments deserializes as null
        if contents.lines().all(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with('#')
        }) {
            return Ok(Config::default());
        }
        serde_yml::from_str(contents)
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "hretl")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.upload_folder.is_some() {
            self.upload_folder = other.upload_folder;
        }
        if other.date_format.is_some() {
            self.date_format = other.date_format;
        }
        if other.pool_size.is_some() {
            self.pool_size = other.pool_size;
        }
        if other.file_types.is_some() {
            self.file_types = other.file_types;
        }
    }

    /// Get the user name, falling back to the login name
    pub fn user(&self) -> String {
        if let Some(ref user) = self.user {
            return user.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Database file for a workspace
    pub fn database_path(&self, workspace: &Workspace) -> PathBuf {
        match self.database {
            Some(ref path) => workspace.resolve(path),
            None => workspace.hretl_dir().join("hretl.db"),
        }
    }

    /// Archive folder for a workspace
    pub fn upload_folder(&self, workspace: &Workspace) -> PathBuf {
        match self.upload_folder {
            Some(ref path) => workspace.resolve(path),
            None => workspace.uploads_dir(),
        }
    }

    pub fn date_format(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size.filter(|n| *n > 0).unwrap_or(DEFAULT_POOL_SIZE)
    }

    /// Build the file classifier from the configured priority list
    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.file_types.clone().unwrap_or_else(default_rules))
    }
}
