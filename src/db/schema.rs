//! Database schema bootstrap
//!
//! Creates every table the pipeline writes if it does not exist yet. The
//! bootstrap never drops or rewrites data: ledger tables hold audit history.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::{DbError, DbResult};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Ensure all tables exist. Idempotent.
pub fn bootstrap(conn: &Connection) -> DbResult<()> {
    let has_version_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let found: Option<i32> = if has_version_table {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?
    } else {
        None
    };

    if let Some(found) = found {
        if found > SCHEMA_VERSION {
            return Err(DbError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
    }

    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Master data
        CREATE TABLE IF NOT EXISTS department (
            department_id INTEGER PRIMARY KEY,
            department_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS designation (
            designation_id INTEGER PRIMARY KEY,
            designation_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS employee (
            employee_code TEXT PRIMARY KEY,
            employee_name TEXT NOT NULL,
            employee_type TEXT NOT NULL,
            total_experience REAL,
            department_id INTEGER REFERENCES department(department_id),
            designation_id INTEGER REFERENCES designation(designation_id)
        );
        CREATE INDEX IF NOT EXISTS idx_employee_department ON employee(department_id);
        CREATE INDEX IF NOT EXISTS idx_employee_designation ON employee(designation_id);

        CREATE TABLE IF NOT EXISTS project (
            project_id TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            client_name TEXT,
            status TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            CHECK (end_date IS NULL OR end_date >= start_date)
        );

        -- Allocation history, one row per (employee, project, effective_from)
        CREATE TABLE IF NOT EXISTS project_allocation (
            allocation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_code TEXT NOT NULL REFERENCES employee(employee_code),
            project_id TEXT NOT NULL REFERENCES project(project_id),
            allocation_percentage REAL NOT NULL
                CHECK (allocation_percentage >= 0 AND allocation_percentage <= 100),
            effective_from TEXT NOT NULL,
            effective_to TEXT,
            allocation_status TEXT NOT NULL,
            change_reason TEXT,
            CHECK (effective_to IS NULL OR effective_to >= effective_from),
            UNIQUE (employee_code, project_id, effective_from)
        );
        CREATE INDEX IF NOT EXISTS idx_allocation_project ON project_allocation(project_id);

        -- Timesheet entries, one row per (employee, project, work_date)
        CREATE TABLE IF NOT EXISTS timesheet (
            timesheet_id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_code TEXT NOT NULL REFERENCES employee(employee_code),
            project_id TEXT NOT NULL REFERENCES project(project_id),
            work_date TEXT NOT NULL,
            hours_worked REAL NOT NULL CHECK (hours_worked >= 0),
            task_description TEXT,
            UNIQUE (employee_code, project_id, work_date)
        );
        CREATE INDEX IF NOT EXISTS idx_timesheet_project ON timesheet(project_id);
        CREATE INDEX IF NOT EXISTS idx_timesheet_work_date ON timesheet(work_date);

        -- Run ledger: one row per ingested file
        CREATE TABLE IF NOT EXISTS csv_upload_log (
            upload_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_hash TEXT,
            upload_timestamp TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('success', 'partial', 'failed')),
            records_processed INTEGER NOT NULL,
            records_success INTEGER NOT NULL,
            records_failed INTEGER NOT NULL,
            message TEXT,
            CHECK (records_processed = records_success + records_failed)
        );
        CREATE INDEX IF NOT EXISTS idx_upload_log_timestamp ON csv_upload_log(upload_timestamp);
        CREATE INDEX IF NOT EXISTS idx_upload_log_batch ON csv_upload_log(batch_id);

        -- Run ledger: one row per rejected field
        CREATE TABLE IF NOT EXISTS data_validation_errors (
            error_id INTEGER PRIMARY KEY AUTOINCREMENT,
            upload_id TEXT NOT NULL REFERENCES csv_upload_log(upload_id),
            row_number INTEGER NOT NULL,
            field_name TEXT NOT NULL,
            field_value TEXT NOT NULL,
            error_kind TEXT NOT NULL,
            error_message TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_validation_errors_upload ON data_validation_errors(upload_id);

        -- Ledger rows are append-only
        CREATE TRIGGER IF NOT EXISTS csv_upload_log_no_update
            BEFORE UPDATE ON csv_upload_log
            BEGIN SELECT RAISE(ABORT, 'csv_upload_log is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS csv_upload_log_no_delete
            BEFORE DELETE ON csv_upload_log
            BEGIN SELECT RAISE(ABORT, 'csv_upload_log is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS data_validation_errors_no_update
            BEFORE UPDATE ON data_validation_errors
            BEGIN SELECT RAISE(ABORT, 'data_validation_errors is append-only'); END;
        CREATE TRIGGER IF NOT EXISTS data_validation_errors_no_delete
            BEFORE DELETE ON data_validation_errors
            BEGIN SELECT RAISE(ABORT, 'data_validation_errors is append-only'); END;

        -- Activity log
        CREATE TABLE IF NOT EXISTS system_logs (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            user TEXT,
            description TEXT NOT NULL,
            details TEXT,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_system_logs_event_type ON system_logs(event_type);
        CREATE INDEX IF NOT EXISTS idx_system_logs_timestamp ON system_logs(timestamp);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_bootstrap_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();

        let names = table_names(&conn);
        for table in [
            "department",
            "designation",
            "employee",
            "project",
            "project_allocation",
            "timesheet",
            "csv_upload_log",
            "data_validation_errors",
            "system_logs",
        ] {
            assert!(names.iter().any(|n| n == table), "missing {}", table);
        }
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute(
            "INSERT INTO department (department_id, department_name) VALUES (1, 'Engineering')",
            [],
        )
        .unwrap();
        bootstrap(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM department", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_bootstrap_refuses_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION + 1],
        )
        .unwrap();

        let err = bootstrap(&conn).unwrap_err();
        assert!(matches!(err, DbError::SchemaTooNew { .. }));
    }

    #[test]
    fn test_ledger_tables_reject_updates() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        conn.execute(
            r#"INSERT INTO csv_upload_log
               (upload_id, batch_id, file_type, file_name, upload_timestamp, status,
                records_processed, records_success, records_failed)
               VALUES ('u1', 'b1', 'employee', 'e.csv', '2024-01-01T00:00:00Z', 'success', 1, 1, 0)"#,
            [],
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE csv_upload_log SET status = 'failed'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM csv_upload_log", []).is_err());
    }

    #[test]
    fn test_upload_log_counts_must_balance() {
        let conn = Connection::open_in_memory().unwrap();
        bootstrap(&conn).unwrap();
        let result = conn.execute(
            r#"INSERT INTO csv_upload_log
               (upload_id, batch_id, file_type, file_name, upload_timestamp, status,
                records_processed, records_success, records_failed)
               VALUES ('u1', 'b1', 'employee', 'e.csv', '2024-01-01T00:00:00Z', 'partial', 3, 1, 1)"#,
            [],
        );
        assert!(result.is_err());
    }
}
