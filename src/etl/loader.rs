//! Loader: upsert validated records inside one transaction per file

use rusqlite::{params_from_iter, Connection};

use crate::core::error::LoadError;
use crate::core::record::RecordType;
use crate::etl::records::Record;

/// Upsert statement for a record type, keyed on its natural or composite key
pub fn upsert_sql(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::Department => {
            "INSERT INTO department (department_id, department_name) VALUES (?1, ?2)
             ON CONFLICT(department_id) DO UPDATE SET department_name = excluded.department_name"
        }
        RecordType::Designation => {
            "INSERT INTO designation (designation_id, designation_name) VALUES (?1, ?2)
             ON CONFLICT(designation_id) DO UPDATE SET designation_name = excluded.designation_name"
        }
        RecordType::Employee => {
            "INSERT INTO employee (employee_code, employee_name, employee_type, total_experience,
                                   department_id, designation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(employee_code) DO UPDATE SET
                employee_name = excluded.employee_name,
                employee_type = excluded.employee_type,
                total_experience = excluded.total_experience,
                department_id = excluded.department_id,
                designation_id = excluded.designation_id"
        }
        RecordType::Project => {
            "INSERT INTO project (project_id, project_name, client_name, status, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_id) DO UPDATE SET
                project_name = excluded.project_name,
                client_name = excluded.client_name,
                status = excluded.status,
                start_date = excluded.start_date,
                end_date = excluded.end_date"
        }
        RecordType::ProjectAllocation => {
            "INSERT INTO project_allocation (employee_code, project_id, allocation_percentage,
                                             effective_from, effective_to, allocation_status,
                                             change_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(employee_code, project_id, effective_from) DO UPDATE SET
                allocation_percentage = excluded.allocation_percentage,
                effective_to = excluded.effective_to,
                allocation_status = excluded.allocation_status,
                change_reason = excluded.change_reason"
        }
        RecordType::Timesheet => {
            "INSERT INTO timesheet (employee_code, project_id, work_date, hours_worked,
                                    task_description)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(employee_code, project_id, work_date) DO UPDATE SET
                hours_worked = excluded.hours_worked,
                task_description = excluded.task_description"
        }
    }
}

/// Upsert every record of one file.
///
/// All-or-nothing: on any failure the transaction is dropped uncommitted and
/// rolls back, so no row of the file is left in the store.
pub fn load(
    conn: &mut Connection,
    record_type: RecordType,
    records: &[Record],
) -> Result<usize, LoadError> {
    let wrap = |source| LoadError {
        record_type,
        source,
    };

    let tx = conn.transaction().map_err(wrap)?;
    for record in records {
        let mut stmt = tx
            .prepare_cached(upsert_sql(record.record_type()))
            .map_err(wrap)?;
        stmt.execute(params_from_iter(record.values()))
            .map_err(wrap)?;
    }
    tx.commit().map_err(wrap)?;

    tracing::debug!(record_type = %record_type, rows = records.len(), "load committed");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::etl::records::{Department, Employee, Timesheet};
    use chrono::NaiveDate;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::bootstrap(&conn).unwrap();
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    fn dept(id: i64, name: &str) -> Record {
        Record::Department(Department {
            department_id: id,
            department_name: name.to_string(),
        })
    }

    #[test]
    fn test_upsert_updates_existing_rows() {
        let mut conn = setup();
        load(&mut conn, RecordType::Department, &[dept(1, "Eng")]).unwrap();
        load(&mut conn, RecordType::Department, &[dept(1, "Engineering"), dept(2, "HR")]).unwrap();

        assert_eq!(count(&conn, "department"), 2);
        let name: String = conn
            .query_row(
                "SELECT department_name FROM department WHERE department_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "Engineering");
    }

    #[test]
    fn test_timesheet_reload_is_idempotent() {
        let mut conn = setup();
        conn.execute_batch(
            "INSERT INTO employee (employee_code, employee_name, employee_type) VALUES ('E1', 'Ann', 'Permanent');
             INSERT INTO project (project_id, project_name, status, start_date) VALUES ('P1', 'Core', 'Active', '2024-01-01');",
        )
        .unwrap();
        let entry = Record::Timesheet(Timesheet {
            employee_code: "E1".to_string(),
            project_id: "P1".to_string(),
            work_date: NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
            hours_worked: 8.0,
            task_description: None,
        });
        load(&mut conn, RecordType::Timesheet, &[entry.clone()]).unwrap();
        load(&mut conn, RecordType::Timesheet, &[entry]).unwrap();
        assert_eq!(count(&conn, "timesheet"), 1);
    }

    #[test]
    fn test_failure_rolls_back_whole_file() {
        let mut conn = setup();
        let orphan = Record::Employee(Employee {
            employee_code: "E2".to_string(),
            employee_name: "Bo".to_string(),
            employee_type: "Contract".to_string(),
            total_experience: None,
            department_id: Some(42),
            designation_id: None,
        });
        let good = Record::Employee(Employee {
            employee_code: "E1".to_string(),
            employee_name: "Ann".to_string(),
            employee_type: "Permanent".to_string(),
            total_experience: Some(3.0),
            department_id: None,
            designation_id: None,
        });

        let err = load(&mut conn, RecordType::Employee, &[good, orphan]).unwrap_err();
        assert_eq!(err.record_type, RecordType::Employee);
        assert_eq!(count(&conn, "employee"), 0);
    }
}
