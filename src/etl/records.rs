//! Typed records produced by the validators

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::Serialize;

use crate::core::record::RecordType;

/// Storage format for date columns
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Department {
    pub department_id: i64,
    pub department_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Designation {
    pub designation_id: i64,
    pub designation_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Employee {
    pub employee_code: String,
    pub employee_name: String,
    pub employee_type: String,
    pub total_experience: Option<f64>,
    pub department_id: Option<i64>,
    pub designation_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub client_name: Option<String>,
    pub status: String,
    pub start_date: NaiveDate,
    /// None while the project is ongoing
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAllocation {
    pub employee_code: String,
    pub project_id: String,
    pub allocation_percentage: f64,
    pub effective_from: NaiveDate,
    /// None while the allocation is active
    pub effective_to: Option<NaiveDate>,
    pub allocation_status: String,
    pub change_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timesheet {
    pub employee_code: String,
    pub project_id: String,
    pub work_date: NaiveDate,
    pub hours_worked: f64,
    pub task_description: Option<String>,
}

/// A validated row of any record type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum Record {
    Department(Department),
    Designation(Designation),
    Employee(Employee),
    Project(Project),
    ProjectAllocation(ProjectAllocation),
    Timesheet(Timesheet),
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        match self {
            Record::Department(_) => RecordType::Department,
            Record::Designation(_) => RecordType::Designation,
            Record::Employee(_) => RecordType::Employee,
            Record::Project(_) => RecordType::Project,
            Record::ProjectAllocation(_) => RecordType::ProjectAllocation,
            Record::Timesheet(_) => RecordType::Timesheet,
        }
    }

    /// Column values in the order of the loader's upsert statement
    pub fn values(&self) -> Vec<Value> {
        match self {
            Record::Department(d) => vec![
                Value::Integer(d.department_id),
                text(&d.department_name),
            ],
            Record::Designation(d) => vec![
                Value::Integer(d.designation_id),
                text(&d.designation_name),
            ],
            Record::Employee(e) => vec![
                text(&e.employee_code),
                text(&e.employee_name),
                text(&e.employee_type),
                e.total_experience.map_or(Value::Null, Value::Real),
                e.department_id.map_or(Value::Null, Value::Integer),
                e.designation_id.map_or(Value::Null, Value::Integer),
            ],
            Record::Project(p) => vec![
                text(&p.project_id),
                text(&p.project_name),
                opt_text(&p.client_name),
                text(&p.status),
                date(&p.start_date),
                p.end_date.as_ref().map_or(Value::Null, date),
            ],
            Record::ProjectAllocation(a) => vec![
                text(&a.employee_code),
                text(&a.project_id),
                Value::Real(a.allocation_percentage),
                date(&a.effective_from),
                a.effective_to.as_ref().map_or(Value::Null, date),
                text(&a.allocation_status),
                opt_text(&a.change_reason),
            ],
            Record::Timesheet(t) => vec![
                text(&t.employee_code),
                text(&t.project_id),
                date(&t.work_date),
                Value::Real(t.hours_worked),
                opt_text(&t.task_description),
            ],
        }
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> Value {
    s.as_deref().map_or(Value::Null, text)
}

fn date(d: &NaiveDate) -> Value {
    Value::Text(d.format(STORAGE_DATE_FORMAT).to_string())
}
