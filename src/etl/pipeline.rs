//! Pipeline orchestrator
//!
//! Runs one submitted batch: every recognized file goes through
//! read -> validate -> load -> ledger, one file at a time in dependency
//! order. File level failures are recorded and the batch moves on; an
//! infrastructure failure stops the batch and the remaining files are
//! reported as not attempted.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::core::classifier::{Classification, ClassificationMiss, ClassifiedFile};
use crate::core::config::DEFAULT_DATE_FORMAT;
use crate::core::error::{PipelineError, RowError};
use crate::core::record::RecordType;
use crate::db::activity::{ActivityEvent, ActivitySink};
use crate::db::keys::KnownKeys;
use crate::db::ledger::{self, UploadLog, UploadStatus};
use crate::db::ConnectionProvider;
use crate::etl::loader;
use crate::etl::reader::StageReader;
use crate::etl::validate::ValidationContext;

/// Per-run settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Recorded with activity events
    pub user: String,
    /// Format of every date column
    pub date_format: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            user: "unknown".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Aggregate counts over every attempted file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub records_processed: u64,
    pub records_success: u64,
    pub records_failed: u64,
    /// Field errors per stage
    pub validation_errors: BTreeMap<RecordType, u64>,
}

impl PipelineStats {
    fn aggregate(files: &[FileReport]) -> Self {
        let mut stats = PipelineStats::default();
        for file in files {
            stats.records_processed += file.records_processed;
            stats.records_success += file.records_success;
            stats.records_failed += file.records_failed;
            *stats.validation_errors.entry(file.record_type).or_default() +=
                file.validation_errors;
        }
        stats
    }
}

/// Outcome of one attempted file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Ledger row id; `None` when the batch aborted before it was written
    pub upload_id: Option<String>,
    pub record_type: RecordType,
    pub file_name: String,
    pub status: UploadStatus,
    pub records_processed: u64,
    pub records_success: u64,
    pub records_failed: u64,
    /// Number of field errors written to the ledger
    pub validation_errors: u64,
    pub message: Option<String>,
}

impl FileReport {
    fn aborted(file: &ClassifiedFile, err: &PipelineError) -> Self {
        Self {
            upload_id: None,
            record_type: file.record_type,
            file_name: file.file_name(),
            status: UploadStatus::Failed,
            records_processed: 0,
            records_success: 0,
            records_failed: 0,
            validation_errors: 0,
            message: Some(err.to_string()),
        }
    }
}

/// A recognized file the batch never reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub record_type: RecordType,
    pub file_name: String,
}

/// Result of one batch submission
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    /// True only when every recognized file loaded without a rejected row
    pub success: bool,
    pub message: String,
    pub stats: PipelineStats,
    pub files: Vec<FileReport>,
    pub unrecognized: Vec<ClassificationMiss>,
    pub not_attempted: Vec<SkippedFile>,
}

/// How a single file ended, before it is written to the ledger
struct FileOutcome {
    status: UploadStatus,
    processed: u64,
    success: u64,
    rejected: Vec<RowError>,
    message: Option<String>,
}

impl FileOutcome {
    fn malformed(reason: String) -> Self {
        Self {
            status: UploadStatus::Failed,
            processed: 0,
            success: 0,
            rejected: Vec::new(),
            message: Some(reason),
        }
    }

    fn loaded(processed: u64, success: u64, rejected: Vec<RowError>) -> Self {
        Self {
            status: UploadStatus::from_counts(success, processed - success),
            processed,
            success,
            rejected,
            message: None,
        }
    }

    fn rolled_back(processed: u64, rejected: Vec<RowError>, reason: String) -> Self {
        Self {
            status: UploadStatus::Failed,
            processed,
            success: 0,
            rejected,
            message: Some(reason),
        }
    }

    fn failed(&self) -> u64 {
        self.processed - self.success
    }

    fn field_errors(&self) -> u64 {
        self.rejected.iter().map(|r| r.errors.len() as u64).sum()
    }
}

/// Batch orchestrator
pub struct Pipeline<'a> {
    provider: &'a dyn ConnectionProvider,
    activity: &'a dyn ActivitySink,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        provider: &'a dyn ConnectionProvider,
        activity: &'a dyn ActivitySink,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            activity,
            options,
        }
    }

    /// Process a classified batch
    pub fn run(&self, batch: Classification) -> BatchReport {
        let batch_id = ledger::new_id();
        let span = tracing::info_span!("batch", batch_id = %batch_id);
        let _enter = span.enter();

        let Classification {
            mut recognized,
            unrecognized,
        } = batch;
        for miss in &unrecognized {
            tracing::warn!(file = %miss.file_name, "unrecognized file skipped");
        }

        // Stable: files of equal rank keep submission order
        recognized.sort_by_key(|f| f.record_type.load_rank());

        let mut files = Vec::with_capacity(recognized.len());
        let mut fatal = None;
        let mut pending = recognized.into_iter();
        for file in pending.by_ref() {
            match self.process_file(&batch_id, &file) {
                Ok(report) => files.push(report),
                Err(err) => {
                    tracing::error!(file = %file.path.display(), error = %err, "batch aborted");
                    files.push(FileReport::aborted(&file, &err));
                    fatal = Some(err);
                    break;
                }
            }
        }
        let not_attempted: Vec<SkippedFile> = pending
            .map(|f| SkippedFile {
                record_type: f.record_type,
                file_name: f.file_name(),
            })
            .collect();

        let stats = PipelineStats::aggregate(&files);
        let success = fatal.is_none()
            && !files.is_empty()
            && files.iter().all(|f| f.status == UploadStatus::Success);
        let message = summarize(&files, &stats, fatal.as_ref(), not_attempted.len());

        tracing::info!(
            success,
            files = files.len(),
            processed = stats.records_processed,
            loaded = stats.records_success,
            rejected = stats.records_failed,
            "batch finished"
        );

        BatchReport {
            batch_id,
            success,
            message,
            stats,
            files,
            unrecognized,
            not_attempted,
        }
    }

    fn process_file(
        &self,
        batch_id: &str,
        file: &ClassifiedFile,
    ) -> Result<FileReport, PipelineError> {
        let file_name = file.file_name();
        let span = tracing::info_span!("file", file = %file_name, record_type = %file.record_type);
        let _enter = span.enter();

        let file_hash = hash_file(&file.path);
        let outcome = self.ingest(file)?;

        let upload = UploadLog {
            upload_id: ledger::new_id(),
            batch_id: batch_id.to_string(),
            file_type: file.record_type,
            file_name: file_name.clone(),
            file_hash,
            timestamp: Utc::now(),
            status: outcome.status,
            records_processed: outcome.processed,
            records_success: outcome.success,
            records_failed: outcome.failed(),
            message: outcome.message.clone(),
        };

        {
            let mut conn = self
                .provider
                .connection()
                .map_err(|e| PipelineError::infrastructure("writing the run ledger", e))?;
            ledger::record_upload(&mut conn, &upload, &outcome.rejected)
                .map_err(|e| PipelineError::infrastructure("writing the run ledger", e))?;
        }

        self.activity.record(&ActivityEvent::FileUpload {
            file_name: file_name.clone(),
            file_type: file.record_type,
            user: self.options.user.clone(),
            status: upload.status,
        });
        self.activity.record(&ActivityEvent::FileProcessing {
            file_name: file_name.clone(),
            records_processed: upload.records_processed,
            records_success: upload.records_success,
            records_failed: upload.records_failed,
            user: self.options.user.clone(),
        });

        tracing::info!(
            upload_id = %upload.upload_id,
            status = %upload.status,
            processed = upload.records_processed,
            loaded = upload.records_success,
            rejected = upload.records_failed,
            "file logged"
        );

        Ok(FileReport {
            upload_id: Some(upload.upload_id),
            record_type: file.record_type,
            file_name,
            status: upload.status,
            records_processed: upload.records_processed,
            records_success: upload.records_success,
            records_failed: upload.records_failed,
            validation_errors: outcome.field_errors(),
            message: upload.message,
        })
    }

    /// Read, validate and load one file
    fn ingest(&self, file: &ClassifiedFile) -> Result<FileOutcome, PipelineError> {
        let record_type = file.record_type;
        let reader = match StageReader::open(&file.path, record_type) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(error = %e, "malformed file");
                return Ok(FileOutcome::malformed(e.reason.to_string()));
            }
        };

        // One connection for the whole file; returned to the pool on every exit
        let mut conn = self
            .provider
            .connection()
            .map_err(|e| PipelineError::infrastructure("acquiring a connection", e))?;
        let keys = KnownKeys::load(&conn, record_type.references())
            .map_err(|e| PipelineError::infrastructure("loading reference keys", e))?;
        let ctx = ValidationContext {
            keys: &keys,
            date_format: &self.options.date_format,
        };

        let validator = reader.stage().validator;
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        let mut processed = 0u64;
        for row in reader {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed file");
                    return Ok(FileOutcome::malformed(e.reason.to_string()));
                }
            };
            processed += 1;
            match validator(&row, &ctx) {
                Ok(record) => valid.push(record),
                Err(errors) => {
                    tracing::debug!(line = row.line, errors = errors.len(), "row rejected");
                    rejected.push(RowError {
                        row_number: row.line,
                        errors,
                    });
                }
            }
        }

        match loader::load(&mut conn, record_type, &valid) {
            Ok(loaded) => Ok(FileOutcome::loaded(processed, loaded as u64, rejected)),
            Err(e) => {
                tracing::warn!(error = %e, "load rolled back");
                Ok(FileOutcome::rolled_back(processed, rejected, e.to_string()))
            }
        }
    }
}

/// SHA-256 of the file contents, for provenance
fn hash_file(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).ok()?;
    Some(format!("{:x}", hasher.finalize()))
}

fn summarize(
    files: &[FileReport],
    stats: &PipelineStats,
    fatal: Option<&PipelineError>,
    not_attempted: usize,
) -> String {
    if files.is_empty() {
        return "no recognized files to process".to_string();
    }

    let problems: Vec<String> = files
        .iter()
        .filter(|f| f.status != UploadStatus::Success)
        .map(|f| match &f.message {
            Some(message) => format!("{} '{}': {}", f.record_type, f.file_name, message),
            None => format!(
                "{} '{}': {} of {} record(s) rejected",
                f.record_type, f.file_name, f.records_failed, f.records_processed
            ),
        })
        .collect();

    let mut message = if problems.is_empty() {
        format!(
            "processed {} file(s): {} record(s) loaded",
            files.len(),
            stats.records_success
        )
    } else {
        format!("completed with errors: {}", problems.join("; "))
    };

    if fatal.is_some() && not_attempted > 0 {
        message.push_str(&format!("; {} file(s) not attempted", not_attempted));
    }
    message
}
