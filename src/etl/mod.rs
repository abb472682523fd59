//! Ingest pipeline: stage readers, validators, loader and orchestrator

pub mod loader;
pub mod pipeline;
pub mod reader;
pub mod records;
pub mod stage;
pub mod validate;

pub use pipeline::{BatchReport, FileReport, Pipeline, PipelineOptions, PipelineStats, SkippedFile};
pub use reader::{RawRow, StageReader};
pub use records::Record;
pub use stage::{stage, Column, Stage};
pub use validate::{ReferenceLookup, ValidationContext};
