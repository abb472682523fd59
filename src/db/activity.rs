//! Activity log collaborator
//!
//! The pipeline reports file-upload and file-processing events to an
//! [`ActivitySink`]. Delivery is best-effort: a sink that fails must not
//! change the outcome of the batch.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::json;

use crate::db::ledger::{format_timestamp, parse_timestamp, UploadStatus};
use crate::db::{ConnectionProvider, Database};
use crate::core::record::RecordType;

pub const FILE_UPLOAD: &str = "FILE_UPLOAD";
pub const FILE_PROCESSING: &str = "FILE_PROCESSING";

/// An event worth recording in the activity log
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    /// A file was accepted into a batch
    FileUpload {
        file_name: String,
        file_type: RecordType,
        user: String,
        status: UploadStatus,
    },
    /// A file finished processing
    FileProcessing {
        file_name: String,
        records_processed: u64,
        records_success: u64,
        records_failed: u64,
        user: String,
    },
}

impl ActivityEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ActivityEvent::FileUpload { .. } => FILE_UPLOAD,
            ActivityEvent::FileProcessing { .. } => FILE_PROCESSING,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            ActivityEvent::FileUpload { user, .. } | ActivityEvent::FileProcessing { user, .. } => {
                user
            }
        }
    }

    pub fn description(&self) -> String {
        match self {
            ActivityEvent::FileUpload {
                file_name,
                file_type,
                status,
                ..
            } => format!("Uploaded {} file '{}' ({})", file_type.label(), file_name, status),
            ActivityEvent::FileProcessing {
                file_name,
                records_processed,
                records_success,
                ..
            } => format!(
                "Processed '{}': {}/{} records loaded",
                file_name, records_success, records_processed
            ),
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            ActivityEvent::FileUpload {
                file_name,
                file_type,
                status,
                ..
            } => json!({
                "file_name": file_name,
                "file_type": file_type,
                "status": status,
            }),
            ActivityEvent::FileProcessing {
                file_name,
                records_processed,
                records_success,
                records_failed,
                ..
            } => json!({
                "file_name": file_name,
                "records_processed": records_processed,
                "records_success": records_success,
                "records_failed": records_failed,
            }),
        }
    }
}

/// Receiver of activity events
pub trait ActivitySink: Send + Sync {
    /// Record an event. Implementations swallow their own failures.
    fn record(&self, event: &ActivityEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActivity;

impl ActivitySink for NoActivity {
    fn record(&self, _event: &ActivityEvent) {}
}

/// Sink writing to the `system_logs` table
#[derive(Clone)]
pub struct SqliteActivityLog {
    db: Database,
}

impl SqliteActivityLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn try_record(&self, event: &ActivityEvent) -> Result<(), crate::core::error::DbError> {
        let conn = self.db.connection()?;
        insert_event(&conn, event, Utc::now())?;
        Ok(())
    }
}

impl ActivitySink for SqliteActivityLog {
    fn record(&self, event: &ActivityEvent) {
        if let Err(e) = self.try_record(event) {
            tracing::warn!(
                event_type = event.event_type(),
                error = %e,
                "failed to write activity log"
            );
        }
    }
}

/// Insert one event row
pub fn insert_event(
    conn: &Connection,
    event: &ActivityEvent,
    at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO system_logs (event_type, user, description, details, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_type(),
            event.user(),
            event.description(),
            event.details().to_string(),
            format_timestamp(&at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// One stored activity row
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub log_id: i64,
    pub event_type: String,
    pub user: Option<String>,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Summary of the activity log
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityStats {
    pub total: u64,
    /// (event type, count), most frequent first
    pub by_event_type: Vec<(String, u64)>,
    /// (YYYY-MM-DD, count) for the most recent days with activity, newest first
    pub by_day: Vec<(String, u64)>,
}

/// List activity rows, newest first
pub fn list_logs(
    conn: &Connection,
    event_type: Option<&str>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<ActivityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT log_id, event_type, user, description, details, timestamp
         FROM system_logs
         WHERE (?1 IS NULL OR event_type = ?1)
         ORDER BY timestamp DESC, log_id DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(
        params![event_type, limit as i64, offset as i64],
        |row| {
            let details: Option<String> = row.get(4)?;
            let timestamp: String = row.get(5)?;
            Ok(ActivityEntry {
                log_id: row.get(0)?,
                event_type: row.get(1)?,
                user: row.get(2)?,
                description: row.get(3)?,
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
                timestamp: parse_timestamp(&timestamp),
            })
        },
    )?;
    rows.collect()
}

/// Number of days covered by [`log_stats`]
pub const STATS_DAYS: usize = 7;

/// Totals per event type and per day
pub fn log_stats(conn: &Connection) -> rusqlite::Result<ActivityStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM system_logs", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT event_type, COUNT(*) FROM system_logs
         GROUP BY event_type ORDER BY COUNT(*) DESC, event_type",
    )?;
    let by_event_type = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM system_logs
         GROUP BY day ORDER BY day DESC LIMIT ?1",
    )?;
    let by_day = stmt
        .query_map(params![STATS_DAYS as i64], |row| {
            Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ActivityStats {
        total: total as u64,
        by_event_type,
        by_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::bootstrap(&conn).unwrap();
        conn
    }

    fn upload_event() -> ActivityEvent {
        ActivityEvent::FileUpload {
            file_name: "employees.csv".to_string(),
            file_type: RecordType::Employee,
            user: "alice".to_string(),
            status: UploadStatus::Success,
        }
    }

    fn processing_event() -> ActivityEvent {
        ActivityEvent::FileProcessing {
            file_name: "employees.csv".to_string(),
            records_processed: 10,
            records_success: 8,
            records_failed: 2,
            user: "alice".to_string(),
        }
    }

    #[test]
    fn test_event_details_carry_counts() {
        let details = processing_event().details();
        assert_eq!(details["records_failed"], 2);
        assert_eq!(upload_event().details()["file_type"], "employee");
        assert!(processing_event().description().contains("8/10"));
    }

    #[test]
    fn test_list_logs_filters_and_pages() {
        let conn = setup();
        let day = parse_timestamp("2024-03-01T09:00:00Z");
        insert_event(&conn, &upload_event(), day).unwrap();
        insert_event(&conn, &processing_event(), day + chrono::Duration::minutes(1)).unwrap();
        insert_event(&conn, &upload_event(), day + chrono::Duration::minutes(2)).unwrap();

        let all = list_logs(&conn, None, 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event_type, FILE_UPLOAD);
        assert_eq!(all[1].event_type, FILE_PROCESSING);

        let uploads = list_logs(&conn, Some(FILE_UPLOAD), 10, 0).unwrap();
        assert_eq!(uploads.len(), 2);

        let page = list_logs(&conn, None, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].event_type, FILE_PROCESSING);
        assert_eq!(page[0].user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_log_stats_counts() {
        let conn = setup();
        let day1 = parse_timestamp("2024-03-01T09:00:00Z");
        let day2 = parse_timestamp("2024-03-02T09:00:00Z");
        insert_event(&conn, &upload_event(), day1).unwrap();
        insert_event(&conn, &upload_event(), day2).unwrap();
        insert_event(&conn, &processing_event(), day2).unwrap();

        let stats = log_stats(&conn).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_event_type[0], (FILE_UPLOAD.to_string(), 2));
        assert_eq!(stats.by_day[0], ("2024-03-02".to_string(), 2));
        assert_eq!(stats.by_day[1], ("2024-03-01".to_string(), 1));
    }

    #[test]
    fn test_sqlite_sink_writes_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(&tmp.path().join("hretl.db"), 1).unwrap();
        let sink = SqliteActivityLog::new(db.clone());
        sink.record(&upload_event());

        let conn = db.connection().unwrap();
        assert_eq!(list_logs(&conn, None, 5, 0).unwrap().len(), 1);
    }
}
