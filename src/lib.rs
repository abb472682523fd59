//! hretl: HR and timesheet CSV ingest toolkit
//!
//! Classifies HR/timesheet CSV exports by file name, validates every row
//! against its record type's rules, loads the accepted rows into SQLite in
//! dependency order and keeps an append-only ledger of each upload and each
//! rejected field.

pub mod cli;
pub mod core;
pub mod db;
pub mod etl;
