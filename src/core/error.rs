//! Error types for the ingest pipeline
//!
//! Field and row level problems are values ([`FieldError`]) that get
//! accumulated and written to the ledger. File level problems
//! ([`MalformedFileError`], [`LoadError`]) abort one file. Infrastructure
//! problems ([`PipelineError`]) abort the whole batch.

use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::record::RecordType;

// =============================================================================
// Field Validation Errors
// =============================================================================

/// Category of a failed field rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldErrorKind {
    /// Required value missing or blank
    Presence,
    /// Value could not be coerced to a number or date
    Type,
    /// Value outside its allowed range or ordering
    Domain,
    /// Foreign key does not resolve to a known entity
    Referential,
}

impl FieldErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorKind::Presence => "presence",
            FieldErrorKind::Type => "type",
            FieldErrorKind::Domain => "domain",
            FieldErrorKind::Referential => "referential",
        }
    }
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule on one field of one row
#[derive(Debug, Clone, PartialEq, Error, Diagnostic, Serialize)]
#[error("{field} = '{value}': {message}")]
#[diagnostic(code(hretl::validation::field))]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(
        kind: FieldErrorKind,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn is_referential(&self) -> bool {
        self.kind == FieldErrorKind::Referential
    }
}

/// All field errors of one rejected row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based line number in the file (the header is line 1)
    pub row_number: u64,
    pub errors: Vec<FieldError>,
}

// =============================================================================
// File Level Errors
// =============================================================================

/// Why a file could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("cannot read file: {0}")]
    Unreadable(String),

    #[error("file is empty (no header row)")]
    Empty,

    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("invalid text encoding at line {line}: {message}")]
    Encoding { line: u64, message: String },

    #[error("corrupt CSV at line {line}: {message}")]
    Csv { line: u64, message: String },
}

/// A file that cannot be ingested at all
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("malformed {record_type} file {path:?}: {reason}")]
#[diagnostic(
    code(hretl::read::malformed),
    help("run 'hretl template <type>' to see the expected header")
)]
pub struct MalformedFileError {
    pub path: PathBuf,
    pub record_type: RecordType,
    #[source]
    pub reason: MalformedReason,
}

/// Unexpected failure inside a file's load transaction
#[derive(Debug, Error, Diagnostic)]
#[error("load of {record_type} rows rolled back: {source}")]
#[diagnostic(code(hretl::load::transaction))]
pub struct LoadError {
    pub record_type: RecordType,
    #[source]
    pub source: rusqlite::Error,
}

// =============================================================================
// Database / Infrastructure Errors
// =============================================================================

/// Errors from the database collaborator
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    #[error("connection pool error: {0}")]
    #[diagnostic(code(hretl::db::pool))]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    #[diagnostic(code(hretl::db::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    #[diagnostic(
        code(hretl::db::schema_version),
        help("upgrade hretl or point 'database' at another file")
    )]
    SchemaTooNew { found: i32, supported: i32 },

    #[error("cannot prepare database location: {0}")]
    #[diagnostic(code(hretl::db::io))]
    Io(#[from] std::io::Error),
}

/// Fatal errors that abort a whole batch
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("database unavailable while {stage}: {source}")]
    #[diagnostic(code(hretl::pipeline::infrastructure))]
    Infrastructure {
        stage: &'static str,
        #[source]
        source: DbError,
    },
}

impl PipelineError {
    pub fn infrastructure(stage: &'static str, source: impl Into<DbError>) -> Self {
        PipelineError::Infrastructure {
            stage,
            source: source.into(),
        }
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
