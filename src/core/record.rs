//! Record types handled by the ingest pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kinds of CSV export the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Department master data
    Department,
    /// Designation (job title) master data
    Designation,
    /// Employee master data
    Employee,
    /// Client projects
    Project,
    /// Employee-to-project allocation history
    ProjectAllocation,
    /// Daily timesheet entries
    Timesheet,
}

impl RecordType {
    /// Get the stable key used in configuration and the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Department => "department",
            RecordType::Designation => "designation",
            RecordType::Employee => "employee",
            RecordType::Project => "project",
            RecordType::ProjectAllocation => "project_allocation",
            RecordType::Timesheet => "timesheet",
        }
    }

    /// Get all record types in dependency order
    pub fn all() -> &'static [RecordType] {
        &[
            RecordType::Department,
            RecordType::Designation,
            RecordType::Employee,
            RecordType::Project,
            RecordType::ProjectAllocation,
            RecordType::Timesheet,
        ]
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            RecordType::Department => "Department",
            RecordType::Designation => "Designation",
            RecordType::Employee => "Employee",
            RecordType::Project => "Project",
            RecordType::ProjectAllocation => "Project Allocation",
            RecordType::Timesheet => "Timesheet",
        }
    }

    /// Target table in the relational store
    pub fn table(&self) -> &'static str {
        match self {
            RecordType::Department => "department",
            RecordType::Designation => "designation",
            RecordType::Employee => "employee",
            RecordType::Project => "project",
            RecordType::ProjectAllocation => "project_allocation",
            RecordType::Timesheet => "timesheet",
        }
    }

    /// Key column of the target table (natural key where one exists)
    pub fn key_column(&self) -> &'static str {
        match self {
            RecordType::Department => "department_id",
            RecordType::Designation => "designation_id",
            RecordType::Employee => "employee_code",
            RecordType::Project => "project_id",
            RecordType::ProjectAllocation => "allocation_id",
            RecordType::Timesheet => "timesheet_id",
        }
    }

    /// Position in the load order. Lower ranks load first; a type only
    /// references types with a strictly lower rank.
    pub fn load_rank(&self) -> u8 {
        match self {
            RecordType::Department | RecordType::Designation => 0,
            RecordType::Employee | RecordType::Project => 1,
            RecordType::ProjectAllocation | RecordType::Timesheet => 2,
        }
    }

    /// Record types whose keys this type references
    pub fn references(&self) -> &'static [RecordType] {
        match self {
            RecordType::Department | RecordType::Designation | RecordType::Project => &[],
            RecordType::Employee => &[RecordType::Department, RecordType::Designation],
            RecordType::ProjectAllocation | RecordType::Timesheet => {
                &[RecordType::Employee, RecordType::Project]
            }
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "department" | "dept" => Ok(RecordType::Department),
            "designation" => Ok(RecordType::Designation),
            "employee" | "emp" => Ok(RecordType::Employee),
            "project" => Ok(RecordType::Project),
            "project_allocation" | "allocation" => Ok(RecordType::ProjectAllocation),
            "timesheet" => Ok(RecordType::Timesheet),
            _ => Err(UnknownRecordType(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown record type key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown record type '{0}' (expected one of: department, designation, employee, project, project_allocation, timesheet)")]
pub struct UnknownRecordType(pub String);
