//! Per record type stage definitions
//!
//! Each [`RecordType`] maps to one [`Stage`]: the columns its reader expects,
//! the validator that turns raw rows into typed records, and an example row
//! used by `hretl template`.

use chrono::NaiveDate;

use crate::core::record::RecordType;
use crate::etl::records::STORAGE_DATE_FORMAT;
use crate::etl::validate::{self, Validator};

/// One expected CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    /// Must be present in the header (values may still be optional)
    pub required: bool,
}

const fn req(name: &'static str) -> Column {
    Column {
        name,
        required: true,
    }
}

const fn opt(name: &'static str) -> Column {
    Column {
        name,
        required: false,
    }
}

/// Reader/validator pair for one record type
pub struct Stage {
    pub record_type: RecordType,
    pub columns: &'static [Column],
    pub validator: Validator,
    pub example: &'static [&'static str],
}

impl Stage {
    /// Names of the columns the header must contain
    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().filter(|c| c.required).map(|c| c.name)
    }

    /// Every column name, in template order
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Example row with its dates written in `date_format`
    pub fn example_row(&self, date_format: &str) -> Vec<String> {
        self.example
            .iter()
            .map(|value| match NaiveDate::parse_from_str(value, STORAGE_DATE_FORMAT) {
                Ok(date) => date.format(date_format).to_string(),
                Err(_) => value.to_string(),
            })
            .collect()
    }
}

static DEPARTMENT: Stage = Stage {
    record_type: RecordType::Department,
    columns: &[req("department_id"), req("department_name")],
    validator: validate::department,
    example: &["10", "Engineering"],
};

static DESIGNATION: Stage = Stage {
    record_type: RecordType::Designation,
    columns: &[req("designation_id"), req("designation_name")],
    validator: validate::designation,
    example: &["3", "Senior Engineer"],
};

static EMPLOYEE: Stage = Stage {
    record_type: RecordType::Employee,
    columns: &[
        req("employee_code"),
        req("employee_name"),
        req("employee_type"),
        opt("total_experience"),
        opt("department_id"),
        opt("designation_id"),
    ],
    validator: validate::employee,
    example: &["E1001", "Asha Rao", "Permanent", "6.5", "10", "3"],
};

static PROJECT: Stage = Stage {
    record_type: RecordType::Project,
    columns: &[
        req("project_id"),
        req("project_name"),
        opt("client_name"),
        req("status"),
        req("start_date"),
        opt("end_date"),
    ],
    validator: validate::project,
    example: &["P-100", "Billing Revamp", "Acme Corp", "Active", "2024-01-15", ""],
};

static PROJECT_ALLOCATION: Stage = Stage {
    record_type: RecordType::ProjectAllocation,
    columns: &[
        req("employee_code"),
        req("project_id"),
        req("allocation_percentage"),
        req("effective_from"),
        opt("effective_to"),
        opt("allocation_status"),
        opt("change_reason"),
    ],
    validator: validate::project_allocation,
    example: &["E1001", "P-100", "50", "2024-02-01", "", "Active", "New project"],
};

static TIMESHEET: Stage = Stage {
    record_type: RecordType::Timesheet,
    columns: &[
        req("employee_code"),
        req("project_id"),
        req("work_date"),
        req("hours_worked"),
        opt("task_description"),
    ],
    validator: validate::timesheet,
    example: &["E1001", "P-100", "2024-02-05", "7.5", "API design review"],
};

/// Look up the stage for a record type
pub fn stage(record_type: RecordType) -> &'static Stage {
    match record_type {
        RecordType::Department => &DEPARTMENT,
        RecordType::Designation => &DESIGNATION,
        RecordType::Employee => &EMPLOYEE,
        RecordType::Project => &PROJECT,
        RecordType::ProjectAllocation => &PROJECT_ALLOCATION,
        RecordType::Timesheet => &TIMESHEET,
    }
}
