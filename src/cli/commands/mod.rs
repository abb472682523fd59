//! CLI command implementations

pub mod activity;
pub mod classify;
pub mod ingest;
pub mod init;
pub mod template;
pub mod uploads;
