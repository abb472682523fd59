//! Run ledger: upload log and validation error rows
//!
//! One `csv_upload_log` row per ingested file and one
//! `data_validation_errors` row per rejected field. Both tables are
//! insert-only; this module has no update or delete path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::core::error::RowError;
use crate::core::record::RecordType;

/// Outcome of one ingested file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Every row loaded
    Success,
    /// Some rows loaded, some rejected
    Partial,
    /// Nothing loaded (malformed file, rollback, or every row rejected)
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Success => "success",
            UploadStatus::Partial => "partial",
            UploadStatus::Failed => "failed",
        }
    }

    /// Status of a file that was read and loaded normally
    pub fn from_counts(records_success: u64, records_failed: u64) -> Self {
        if records_failed == 0 {
            UploadStatus::Success
        } else if records_success == 0 {
            UploadStatus::Failed
        } else {
            UploadStatus::Partial
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(UploadStatus::Success),
            "partial" => Ok(UploadStatus::Partial),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("unknown upload status '{}'", other)),
        }
    }
}

impl ToSql for UploadStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UploadStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for RecordType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecordType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Generate a new upload or batch identifier
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// One `csv_upload_log` row
#[derive(Debug, Clone, Serialize)]
pub struct UploadLog {
    pub upload_id: String,
    pub batch_id: String,
    pub file_type: RecordType,
    pub file_name: String,
    pub file_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: UploadStatus,
    pub records_processed: u64,
    pub records_success: u64,
    pub records_failed: u64,
    pub message: Option<String>,
}

impl UploadLog {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let timestamp: String = row.get(5)?;
        Ok(UploadLog {
            upload_id: row.get(0)?,
            batch_id: row.get(1)?,
            file_type: row.get(2)?,
            file_name: row.get(3)?,
            file_hash: row.get(4)?,
            timestamp: parse_timestamp(&timestamp),
            status: row.get(6)?,
            records_processed: row.get::<_, i64>(7)? as u64,
            records_success: row.get::<_, i64>(8)? as u64,
            records_failed: row.get::<_, i64>(9)? as u64,
            message: row.get(10)?,
        })
    }
}

/// One `data_validation_errors` row
#[derive(Debug, Clone, Serialize)]
pub struct StoredValidationError {
    pub error_id: i64,
    pub upload_id: String,
    pub row_number: u64,
    pub field_name: String,
    pub field_value: String,
    pub error_kind: String,
    pub error_message: String,
}

const UPLOAD_COLUMNS: &str = "upload_id, batch_id, file_type, file_name, file_hash, \
    upload_timestamp, status, records_processed, records_success, records_failed, message";

/// Write one upload and its field errors in a single transaction
pub fn record_upload(
    conn: &mut Connection,
    upload: &UploadLog,
    rejected: &[RowError],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        &format!(
            "INSERT INTO csv_upload_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            UPLOAD_COLUMNS
        ),
        params![
            upload.upload_id,
            upload.batch_id,
            upload.file_type,
            upload.file_name,
            upload.file_hash,
            format_timestamp(&upload.timestamp),
            upload.status,
            upload.records_processed as i64,
            upload.records_success as i64,
            upload.records_failed as i64,
            upload.message,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            r#"INSERT INTO data_validation_errors
               (upload_id, row_number, field_name, field_value, error_kind, error_message)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )?;
        for row in rejected {
            for err in &row.errors {
                stmt.execute(params![
                    upload.upload_id,
                    row.row_number as i64,
                    err.field,
                    err.value,
                    err.kind.as_str(),
                    err.message,
                ])?;
            }
        }
    }

    tx.commit()
}

/// Most recent uploads, newest first
pub fn recent_uploads(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<UploadLog>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM csv_upload_log ORDER BY upload_timestamp DESC, rowid DESC LIMIT ?1",
        UPLOAD_COLUMNS
    ))?;
    let rows = stmt.query_map(params![limit as i64], UploadLog::from_row)?;
    rows.collect()
}

/// Every upload of one batch, in processing order
pub fn batch_uploads(conn: &Connection, batch_id: &str) -> rusqlite::Result<Vec<UploadLog>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM csv_upload_log WHERE batch_id = ?1 ORDER BY rowid",
        UPLOAD_COLUMNS
    ))?;
    let rows = stmt.query_map(params![batch_id], UploadLog::from_row)?;
    rows.collect()
}

/// Look up one upload
pub fn get_upload(conn: &Connection, upload_id: &str) -> rusqlite::Result<Option<UploadLog>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM csv_upload_log WHERE upload_id = ?1",
            UPLOAD_COLUMNS
        ),
        params![upload_id],
        UploadLog::from_row,
    )
    .optional()
}

/// Validation errors of one upload, in file order
pub fn validation_errors(
    conn: &Connection,
    upload_id: &str,
) -> rusqlite::Result<Vec<StoredValidationError>> {
    let mut stmt = conn.prepare(
        r#"SELECT error_id, upload_id, row_number, field_name, field_value, error_kind, error_message
           FROM data_validation_errors
           WHERE upload_id = ?1
           ORDER BY row_number, error_id"#,
    )?;
    let rows = stmt.query_map(params![upload_id], |row| {
        Ok(StoredValidationError {
            error_id: row.get(0)?,
            upload_id: row.get(1)?,
            row_number: row.get::<_, i64>(2)? as u64,
            field_name: row.get(3)?,
            field_value: row.get(4)?,
            error_kind: row.get(5)?,
            error_message: row.get(6)?,
        })
    })?;
    rows.collect()
}

/// Fixed-width RFC 3339 so lexical order matches time order
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
