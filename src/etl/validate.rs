//! Field validation rules
//!
//! Each validator walks every field of a row and accumulates all failures
//! before deciding. A row is either fully trusted ([`Record`]) or rejected
//! with one [`FieldError`] per failing field.

use chrono::NaiveDate;

use crate::core::error::{FieldError, FieldErrorKind};
use crate::core::record::RecordType;
use crate::etl::reader::RawRow;
use crate::etl::records::{
    Department, Designation, Employee, Project, ProjectAllocation, Record, Timesheet,
};

/// Default allocation status when the column is blank or absent
pub const DEFAULT_ALLOCATION_STATUS: &str = "Active";

/// Resolves foreign keys against entities already in the store
pub trait ReferenceLookup {
    /// Whether `key` names an existing entity of type `target`
    fn resolves(&self, target: RecordType, key: &str) -> bool;
}

/// Inputs shared by every row of one file
pub struct ValidationContext<'a> {
    pub keys: &'a dyn ReferenceLookup,
    pub date_format: &'a str,
}

/// Row validator signature
pub type Validator = fn(&RawRow, &ValidationContext<'_>) -> Result<Record, Vec<FieldError>>;

/// Accumulates field errors for one row
struct RowCheck<'r, 'c> {
    row: &'r RawRow,
    ctx: &'c ValidationContext<'c>,
    errors: Vec<FieldError>,
}

impl<'r, 'c> RowCheck<'r, 'c> {
    fn new(row: &'r RawRow, ctx: &'c ValidationContext<'c>) -> Self {
        Self {
            row,
            ctx,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, kind: FieldErrorKind, field: &str, value: &str, message: String) {
        self.errors.push(FieldError::new(kind, field, value, message));
    }

    fn optional_text(&self, field: &str) -> Option<String> {
        let value = self.row.get(field);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn required_text(&mut self, field: &str) -> Option<String> {
        let value = self.optional_text(field);
        if value.is_none() {
            self.fail(FieldErrorKind::Presence, field, "", "is required".to_string());
        }
        value
    }

    fn coerce<T>(
        &mut self,
        field: &str,
        required: bool,
        parse: impl Fn(&str) -> Option<T>,
        expected: &str,
    ) -> Option<T> {
        let row = self.row;
        let raw = row.get(field);
        if raw.is_empty() {
            if required {
                self.fail(FieldErrorKind::Presence, field, "", "is required".to_string());
            }
            return None;
        }
        let parsed = parse(raw);
        if parsed.is_none() {
            self.fail(FieldErrorKind::Type, field, raw, format!("expected {}", expected));
        }
        parsed
    }

    fn integer(&mut self, field: &str, required: bool) -> Option<i64> {
        self.coerce(field, required, |s| s.parse::<i64>().ok(), "an integer")
    }

    fn number(&mut self, field: &str, required: bool) -> Option<f64> {
        self.coerce(
            field,
            required,
            |s| s.parse::<f64>().ok().filter(|n| n.is_finite()),
            "a number",
        )
    }

    fn date(&mut self, field: &str, required: bool) -> Option<NaiveDate> {
        let format = self.ctx.date_format;
        self.coerce(
            field,
            required,
            |s| NaiveDate::parse_from_str(s, format).ok(),
            &format!("a date in format {}", format),
        )
    }

    /// Keep a parsed number only if it lies in `[min, max]`
    fn in_range(&mut self, field: &str, value: Option<f64>, min: f64, max: f64) -> Option<f64> {
        let n = value?;
        if n < min || n > max {
            let raw = self.row.get(field).to_string();
            self.fail(
                FieldErrorKind::Domain,
                field,
                &raw,
                format!("must be between {} and {}", min, max),
            );
            return None;
        }
        Some(n)
    }

    /// Keep a parsed number only if it is not below `min`
    fn at_least(&mut self, field: &str, value: Option<f64>, min: f64) -> Option<f64> {
        let n = value?;
        if n < min {
            let raw = self.row.get(field).to_string();
            self.fail(
                FieldErrorKind::Domain,
                field,
                &raw,
                format!("must be at least {}", min),
            );
            return None;
        }
        Some(n)
    }

    /// Check that `later` does not precede `earlier`; the error names `later_field`
    fn not_before(
        &mut self,
        later_field: &str,
        later: Option<NaiveDate>,
        earlier_field: &str,
        earlier: Option<NaiveDate>,
    ) {
        if let (Some(later), Some(earlier)) = (later, earlier) {
            if later < earlier {
                let raw = self.row.get(later_field).to_string();
                self.fail(
                    FieldErrorKind::Domain,
                    later_field,
                    &raw,
                    format!("must not be earlier than {}", earlier_field),
                );
            }
        }
    }

    /// Check that a parsed key resolves to an existing entity
    fn reference(&mut self, field: &str, target: RecordType, key: Option<&str>) {
        if let Some(key) = key {
            if !self.ctx.keys.resolves(target, key) {
                let raw = self.row.get(field).to_string();
                self.fail(
                    FieldErrorKind::Referential,
                    field,
                    &raw,
                    format!("unknown {} '{}'", target.label().to_lowercase(), key),
                );
            }
        }
    }

    fn finish(self, build: impl FnOnce() -> Option<Record>) -> Result<Record, Vec<FieldError>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        // Every field passed, so every required value is present
        build().ok_or(self.errors)
    }
}

pub fn department(row: &RawRow, ctx: &ValidationContext<'_>) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let id = check.integer("department_id", true);
    let name = check.required_text("department_name");
    check.finish(|| {
        Some(Record::Department(Department {
            department_id: id?,
            department_name: name?,
        }))
    })
}

pub fn designation(row: &RawRow, ctx: &ValidationContext<'_>) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let id = check.integer("designation_id", true);
    let name = check.required_text("designation_name");
    check.finish(|| {
        Some(Record::Designation(Designation {
            designation_id: id?,
            designation_name: name?,
        }))
    })
}

pub fn employee(row: &RawRow, ctx: &ValidationContext<'_>) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let code = check.required_text("employee_code");
    let name = check.required_text("employee_name");
    let employee_type = check.required_text("employee_type");
    let experience = check.number("total_experience", false);
    let experience = check.at_least("total_experience", experience, 0.0);

    let department_id = check.integer("department_id", false);
    check.reference(
        "department_id",
        RecordType::Department,
        department_id.map(|id| id.to_string()).as_deref(),
    );
    let designation_id = check.integer("designation_id", false);
    check.reference(
        "designation_id",
        RecordType::Designation,
        designation_id.map(|id| id.to_string()).as_deref(),
    );

    check.finish(|| {
        Some(Record::Employee(Employee {
            employee_code: code?,
            employee_name: name?,
            employee_type: employee_type?,
            total_experience: experience,
            department_id,
            designation_id,
        }))
    })
}

pub fn project(row: &RawRow, ctx: &ValidationContext<'_>) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let id = check.required_text("project_id");
    let name = check.required_text("project_name");
    let client = check.optional_text("client_name");
    let status = check.required_text("status");
    let start = check.date("start_date", true);
    let end = check.date("end_date", false);
    check.not_before("end_date", end, "start_date", start);

    check.finish(|| {
        Some(Record::Project(Project {
            project_id: id?,
            project_name: name?,
            client_name: client,
            status: status?,
            start_date: start?,
            end_date: end,
        }))
    })
}

pub fn project_allocation(
    row: &RawRow,
    ctx: &ValidationContext<'_>,
) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let employee_code = check.required_text("employee_code");
    check.reference("employee_code", RecordType::Employee, employee_code.as_deref());
    let project_id = check.required_text("project_id");
    check.reference("project_id", RecordType::Project, project_id.as_deref());

    let pct = check.number("allocation_percentage", true);
    let pct = check.in_range("allocation_percentage", pct, 0.0, 100.0);
    let from = check.date("effective_from", true);
    let to = check.date("effective_to", false);
    check.not_before("effective_to", to, "effective_from", from);
    let status = check
        .optional_text("allocation_status")
        .unwrap_or_else(|| DEFAULT_ALLOCATION_STATUS.to_string());
    let reason = check.optional_text("change_reason");

    check.finish(|| {
        Some(Record::ProjectAllocation(ProjectAllocation {
            employee_code: employee_code?,
            project_id: project_id?,
            allocation_percentage: pct?,
            effective_from: from?,
            effective_to: to,
            allocation_status: status,
            change_reason: reason,
        }))
    })
}

pub fn timesheet(row: &RawRow, ctx: &ValidationContext<'_>) -> Result<Record, Vec<FieldError>> {
    let mut check = RowCheck::new(row, ctx);
    let employee_code = check.required_text("employee_code");
    check.reference("employee_code", RecordType::Employee, employee_code.as_deref());
    let project_id = check.required_text("project_id");
    check.reference("project_id", RecordType::Project, project_id.as_deref());

    let work_date = check.date("work_date", true);
    let hours = check.number("hours_worked", true);
    let hours = check.at_least("hours_worked", hours, 0.0);
    let description = check.optional_text("task_description");

    check.finish(|| {
        Some(Record::Timesheet(Timesheet {
            employee_code: employee_code?,
            project_id: project_id?,
            work_date: work_date?,
            hours_worked: hours?,
            task_description: description,
        }))
    })
}
