//! Pipeline scenario tests
//!
//! Drive the library directly against a temporary SQLite database and check
//! the store, the run ledger and the batch report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use hretl::core::error::{DbError, DbResult};
use hretl::core::{Classification, ClassifiedFile, Classifier, RecordType};
use hretl::db::activity::NoActivity;
use hretl::db::{
    ledger, ActivityEvent, ActivitySink, ConnectionProvider, Database, PooledConnection,
    UploadStatus,
};
use hretl::etl::{BatchReport, Pipeline, PipelineOptions};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn setup() -> (TempDir, Database) {
    let tmp = TempDir::new().unwrap();
    let db = Database::open(&tmp.path().join("hretl.db"), 2).unwrap();
    (tmp, db)
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn file(dir: &Path, name: &str, record_type: RecordType, contents: &str) -> ClassifiedFile {
    ClassifiedFile::new(record_type, write(dir, name, contents))
}

fn batch(files: Vec<ClassifiedFile>) -> Classification {
    Classification {
        recognized: files,
        unrecognized: Vec::new(),
    }
}

fn run(db: &Database, files: Vec<ClassifiedFile>) -> BatchReport {
    Pipeline::new(db, &NoActivity, PipelineOptions::default()).run(batch(files))
}

fn count(db: &Database, sql: &str) -> i64 {
    db.connection()
        .unwrap()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

fn master_data(dir: &Path) -> Vec<ClassifiedFile> {
    vec![
        file(
            dir,
            "departments.csv",
            RecordType::Department,
            "department_id,department_name\n1,Engineering\n2,Finance\n",
        ),
        file(
            dir,
            "designations.csv",
            RecordType::Designation,
            "designation_id,designation_name\n1,Engineer\n",
        ),
        file(
            dir,
            "employees.csv",
            RecordType::Employee,
            "employee_code,employee_name,employee_type,department_id,designation_id\n\
             E1,Asha,Permanent,1,1\n\
             E2,Ben,Contract,2,\n",
        ),
        file(
            dir,
            "projects.csv",
            RecordType::Project,
            "project_id,project_name,client_name,status,start_date,end_date\n\
             P1,Billing,Acme,Active,2024-01-01,\n\
             P2,Audit,Initech,Closed,2023-01-01,2023-12-31\n",
        ),
    ]
}

/// Loads master data and returns the directory for further files
fn seeded() -> (TempDir, Database) {
    let (tmp, db) = setup();
    let report = run(&db, master_data(tmp.path()));
    assert!(report.success, "{}", report.message);
    (tmp, db)
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_loaded_rows_never_dangle() {
    let (tmp, db) = seeded();
    run(
        &db,
        vec![
            file(
                tmp.path(),
                "timesheet.csv",
                RecordType::Timesheet,
                "employee_code,project_id,work_date,hours_worked\n\
                 E1,P1,2024-03-01,8\n\
                 E9,P1,2024-03-01,8\n\
                 E2,P9,2024-03-01,8\n",
            ),
            file(
                tmp.path(),
                "allocation.csv",
                RecordType::ProjectAllocation,
                "employee_code,project_id,allocation_percentage,effective_from\n\
                 E1,P1,50,2024-01-01\n\
                 E7,P2,50,2024-01-01\n",
            ),
        ],
    );

    let dangling = count(
        &db,
        "SELECT COUNT(*) FROM timesheet t
         LEFT JOIN employee e ON e.employee_code = t.employee_code
         LEFT JOIN project p ON p.project_id = t.project_id
         WHERE e.employee_code IS NULL OR p.project_id IS NULL",
    ) + count(
        &db,
        "SELECT COUNT(*) FROM project_allocation a
         LEFT JOIN employee e ON e.employee_code = a.employee_code
         LEFT JOIN project p ON p.project_id = a.project_id
         WHERE e.employee_code IS NULL OR p.project_id IS NULL",
    );
    assert_eq!(dangling, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM timesheet"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_allocation"), 1);
}

#[test]
fn test_upload_counts_always_balance() {
    let (tmp, db) = seeded();
    run(
        &db,
        vec![
            file(
                tmp.path(),
                "timesheet.csv",
                RecordType::Timesheet,
                "employee_code,project_id,work_date,hours_worked\nE1,P1,2024-03-01,x\nE1,P1,2024-03-02,4\n",
            ),
            file(
                tmp.path(),
                "bad_timesheet.csv",
                RecordType::Timesheet,
                "employee_code,project_id\nE1,P1\n",
            ),
        ],
    );

    assert!(count(&db, "SELECT COUNT(*) FROM csv_upload_log") >= 6);
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM csv_upload_log
             WHERE records_processed != records_success + records_failed"
        ),
        0
    );
}

#[test]
fn test_resubmission_is_idempotent() {
    let (tmp, db) = seeded();
    let contents = "employee_code,project_id,work_date,hours_worked,task_description\n\
                    E1,P1,2024-03-01,8,Design\n\
                    E2,P1,2024-03-01,6,Review\n";
    let allocation = "employee_code,project_id,allocation_percentage,effective_from\n\
                      E1,P1,60,2024-01-01\n";

    for _ in 0..2 {
        let report = run(
            &db,
            vec![
                file(tmp.path(), "timesheet.csv", RecordType::Timesheet, contents),
                file(
                    tmp.path(),
                    "allocation.csv",
                    RecordType::ProjectAllocation,
                    allocation,
                ),
            ],
        );
        assert!(report.success, "{}", report.message);
    }

    assert_eq!(count(&db, "SELECT COUNT(*) FROM timesheet"), 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM project_allocation"), 1);
    assert_eq!(
        count(
            &db,
            "SELECT COUNT(*) FROM csv_upload_log WHERE file_type = 'timesheet'"
        ),
        2
    );
}

#[test]
fn test_one_error_row_per_invalid_field() {
    let (tmp, db) = seeded();
    let report = run(
        &db,
        vec![file(
            tmp.path(),
            "timesheet.csv",
            RecordType::Timesheet,
            "employee_code,project_id,work_date,hours_worked\n\
             E404,,not-a-date,-1\n\
             E1,P1,2024-03-01,8\n",
        )],
    );

    let upload_id = report.files[0].upload_id.clone().unwrap();
    let conn = db.connection().unwrap();
    let errors = ledger::validation_errors(&conn, &upload_id).unwrap();
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|e| e.row_number == 2));
    assert_eq!(report.files[0].validation_errors, 4);
    assert_eq!(report.files[0].status, UploadStatus::Partial);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_unknown_department_is_rejected() {
    let (tmp, db) = setup();
    let report = run(
        &db,
        vec![
            file(
                tmp.path(),
                "departments.csv",
                RecordType::Department,
                "department_id,department_name\n1,Engineering\n",
            ),
            file(
                tmp.path(),
                "employees.csv",
                RecordType::Employee,
                "employee_code,employee_name,employee_type,department_id\nE5,Cara,Permanent,99\n",
            ),
        ],
    );

    assert!(!report.success);
    assert_eq!(
        count(&db, "SELECT COUNT(*) FROM employee WHERE employee_code = 'E5'"),
        0
    );

    let employee = &report.files[1];
    assert_eq!(employee.status, UploadStatus::Failed);
    let conn = db.connection().unwrap();
    let errors =
        ledger::validation_errors(&conn, employee.upload_id.as_deref().unwrap()).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field_name, "department_id");
    assert_eq!(errors[0].field_value, "99");
    assert_eq!(errors[0].error_kind, "referential");
}

#[test]
fn test_allocation_domain_errors() {
    let (tmp, db) = seeded();
    let report = run(
        &db,
        vec![file(
            tmp.path(),
            "allocation.csv",
            RecordType::ProjectAllocation,
            "employee_code,project_id,allocation_percentage,effective_from,effective_to\n\
             E1,P1,150,2024-01-01,\n\
             E2,P1,85,2024-03-01,2024-02-01\n",
        )],
    );

    let file = &report.files[0];
    assert_eq!(file.status, UploadStatus::Failed);
    assert_eq!((file.records_processed, file.records_failed), (2, 2));

    let conn = db.connection().unwrap();
    let errors = ledger::validation_errors(&conn, file.upload_id.as_deref().unwrap()).unwrap();
    let fields: Vec<(&str, &str)> = errors
        .iter()
        .map(|e| (e.field_name.as_str(), e.error_kind.as_str()))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("allocation_percentage", "domain"),
            ("effective_to", "domain")
        ]
    );
}

#[test]
fn test_unrecognized_files_excluded_from_stats() {
    let (tmp, db) = setup();
    let mut paths: Vec<PathBuf> = master_data(tmp.path())
        .into_iter()
        .take(3)
        .map(|f| f.path)
        .collect();
    paths.push(write(tmp.path(), "payroll.csv", "employee_code,salary\nE1,100\n"));

    let classification = Classifier::default().classify(&paths);
    let report = Pipeline::new(&db, &NoActivity, PipelineOptions::default()).run(classification);

    assert_eq!(report.unrecognized.len(), 1);
    assert_eq!(report.unrecognized[0].file_name, "payroll.csv");
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.stats.records_processed, 5);
    assert!(report.success, "{}", report.message);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM csv_upload_log"), 3);
}

#[test]
fn test_missing_hours_worked_column_is_malformed() {
    let (tmp, db) = seeded();
    let report = run(
        &db,
        vec![file(
            tmp.path(),
            "timesheet.csv",
            RecordType::Timesheet,
            "employee_code,project_id,work_date\nE1,P1,2024-03-01\n",
        )],
    );

    assert!(!report.success);
    let file = &report.files[0];
    assert_eq!(file.status, UploadStatus::Failed);
    assert_eq!(file.records_processed, 0);
    assert!(file.message.as_deref().unwrap().contains("hours_worked"));

    let conn = db.connection().unwrap();
    let stored = ledger::get_upload(&conn, file.upload_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, UploadStatus::Failed);
    assert_eq!(stored.records_processed, 0);
}

#[test]
fn test_ragged_row_aborts_whole_file() {
    let (tmp, db) = setup();
    let report = run(
        &db,
        vec![file(
            tmp.path(),
            "departments.csv",
            RecordType::Department,
            "department_id,department_name\n1,Eng\n2,HR,extra\n",
        )],
    );

    assert!(!report.success);
    let file = &report.files[0];
    assert_eq!(file.status, UploadStatus::Failed);
    assert_eq!(file.records_processed, 0);
    assert_eq!(file.records_failed, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM department"), 0);

    let conn = db.connection().unwrap();
    let upload_id = file.upload_id.as_deref().unwrap();
    assert!(ledger::validation_errors(&conn, upload_id).unwrap().is_empty());
    let stored = ledger::get_upload(&conn, upload_id).unwrap().unwrap();
    assert_eq!(stored.status, UploadStatus::Failed);
    assert_eq!(stored.records_processed, 0);
}

#[test]
fn test_invalid_utf8_after_valid_rows_aborts_file() {
    let (tmp, db) = setup();
    let path = tmp.path().join("designations.csv");
    let mut contents = b"designation_id,designation_name\n1,Engineer\n2,".to_vec();
    contents.extend_from_slice(&[0xff, 0xfe, b'\n']);
    fs::write(&path, contents).unwrap();

    let report = run(&db, vec![ClassifiedFile::new(RecordType::Designation, path)]);

    let file = &report.files[0];
    assert_eq!(file.status, UploadStatus::Failed);
    assert_eq!(file.records_processed, 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM designation"), 0);
}

#[test]
fn test_failed_dependency_rejects_rows_individually() {
    let (tmp, db) = setup();
    let report = run(
        &db,
        vec![
            file(
                tmp.path(),
                "projects.csv",
                RecordType::Project,
                "project_id,project_name,status,start_date\nP1,Billing,Active,2024-01-01\n",
            ),
            // Malformed: the employees never load
            file(
                tmp.path(),
                "employees.csv",
                RecordType::Employee,
                "employee_code,employee_name\nE1,Asha\n",
            ),
            file(
                tmp.path(),
                "timesheet.csv",
                RecordType::Timesheet,
                "employee_code,project_id,work_date,hours_worked\nE1,P1,2024-03-01,8\n",
            ),
        ],
    );

    let timesheet = report
        .files
        .iter()
        .find(|f| f.record_type == RecordType::Timesheet)
        .unwrap();
    assert_eq!(timesheet.records_processed, 1);
    assert_eq!(timesheet.records_failed, 1);
    assert!(timesheet.upload_id.is_some());
    assert_eq!(report.stats.validation_errors[&RecordType::Timesheet], 1);
}

#[test]
fn test_load_failure_rolls_back_file() {
    let (tmp, db) = setup();
    db.connection()
        .unwrap()
        .execute_batch("DROP TABLE department;")
        .unwrap();

    let report = run(
        &db,
        vec![file(
            tmp.path(),
            "departments.csv",
            RecordType::Department,
            "department_id,department_name\n1,Engineering\n2,\n",
        )],
    );

    let file = &report.files[0];
    assert_eq!(file.status, UploadStatus::Failed);
    assert_eq!(file.records_processed, 2);
    assert_eq!(file.records_success, 0);
    assert_eq!(file.records_failed, 2);
    assert!(file.message.as_deref().unwrap().contains("rolled back"));
    // The ledger still holds the rejected row's field error
    assert_eq!(file.validation_errors, 1);
}

// ============================================================================
// Collaborators
// ============================================================================

/// Hands out a fixed number of connections, then reports the pool as down
struct FlakyProvider {
    db: Database,
    remaining: AtomicUsize,
}

impl ConnectionProvider for FlakyProvider {
    fn connection(&self) -> DbResult<PooledConnection> {
        let granted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(DbError::Io(io::Error::other("connection refused")));
        }
        self.db.connection()
    }
}

#[test]
fn test_infrastructure_failure_aborts_remaining_files() {
    let (tmp, db) = setup();
    let provider = FlakyProvider {
        db: db.clone(),
        // One file: connection for the load plus one for the ledger
        remaining: AtomicUsize::new(2),
    };
    let files = master_data(tmp.path()).into_iter().take(3).collect();

    let report = Pipeline::new(&provider, &NoActivity, PipelineOptions::default()).run(batch(files));

    assert!(!report.success);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].status, UploadStatus::Success);
    assert_eq!(report.files[1].status, UploadStatus::Failed);
    assert!(report.files[1].upload_id.is_none());
    assert_eq!(report.not_attempted.len(), 1);
    assert_eq!(report.not_attempted[0].record_type, RecordType::Employee);
    assert!(report.message.contains("not attempted"));
    assert_eq!(count(&db, "SELECT COUNT(*) FROM csv_upload_log"), 1);
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ActivityEvent>>,
}

impl ActivitySink for RecordingSink {
    fn record(&self, event: &ActivityEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[test]
fn test_activity_events_per_file() {
    let (tmp, db) = setup();
    let sink = RecordingSink::default();
    let options = PipelineOptions {
        user: "alice".to_string(),
        ..PipelineOptions::default()
    };
    let files = master_data(tmp.path()).into_iter().take(2).collect();
    Pipeline::new(&db, &sink, options).run(batch(files));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(matches!(
        &events[1],
        ActivityEvent::FileProcessing { records_processed: 2, user, .. } if user == "alice"
    ));
}

#[test]
fn test_activity_failure_does_not_change_outcome() {
    let (tmp, db) = setup();
    db.connection()
        .unwrap()
        .execute_batch("DROP TABLE system_logs;")
        .unwrap();
    let sink = hretl::db::SqliteActivityLog::new(db.clone());
    let files = master_data(tmp.path()).into_iter().take(1).collect();

    let report = Pipeline::new(&db, &sink, PipelineOptions::default()).run(batch(files));
    assert!(report.success, "{}", report.message);
}
