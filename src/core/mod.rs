//! Core module - record types, classification, workspace and configuration

pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod workspace;

pub use classifier::{
    ClassificationMiss, Classification, ClassifiedFile, Classifier, FileTypeRule,
};
pub use config::Config;
pub use error::{
    DbError, FieldError, FieldErrorKind, LoadError, MalformedFileError, MalformedReason,
    PipelineError, RowError,
};
pub use record::RecordType;
pub use workspace::{Workspace, WorkspaceError};
