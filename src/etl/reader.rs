//! Stage readers: CSV file -> raw rows
//!
//! The header is checked against the stage's column list when the reader is
//! opened. Rows are then produced lazily; a structural problem found part way
//! through (bad UTF-8, ragged rows) surfaces as a [`MalformedFileError`] from
//! the iterator.

use csv::{ErrorKind, ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::core::error::{MalformedFileError, MalformedReason};
use crate::core::record::RecordType;
use crate::etl::stage::{stage, Stage};

/// One data row, keyed by expected column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the file (the header is line 1)
    pub line: u64,
    values: HashMap<&'static str, String>,
}

impl RawRow {
    /// Build a row by hand
    pub fn new<I>(line: u64, values: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, String)>,
    {
        Self {
            line,
            values: values.into_iter().collect(),
        }
    }

    /// Trimmed value of a column, empty when absent
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Reader for one classified file
pub struct StageReader {
    path: PathBuf,
    stage: &'static Stage,
    positions: Vec<(&'static str, usize)>,
    records: StringRecordsIntoIter<File>,
}

impl StageReader {
    /// Open a file and check its header against the stage columns
    pub fn open(path: &Path, record_type: RecordType) -> Result<Self, MalformedFileError> {
        let stage = stage(record_type);
        let malformed = |reason| MalformedFileError {
            path: path.to_path_buf(),
            record_type,
            reason,
        };

        let file = File::open(path)
            .map_err(|e| malformed(MalformedReason::Unreadable(e.to_string())))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| malformed(reason_for(&e)))?
            .clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(malformed(MalformedReason::Empty));
        }

        let header_map = build_header_map(&headers);
        let missing: Vec<String> = stage
            .required_columns()
            .filter(|name| !header_map.contains_key(*name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(malformed(MalformedReason::MissingColumns(missing)));
        }

        let positions: Vec<(&'static str, usize)> = stage
            .columns
            .iter()
            .filter_map(|c| header_map.get(c.name).map(|&idx| (c.name, idx)))
            .collect();

        let extra: Vec<&String> = header_map
            .keys()
            .filter(|h| !stage.columns.iter().any(|c| c.name == h.as_str()))
            .collect();
        if !extra.is_empty() {
            tracing::debug!(
                file = %path.display(),
                record_type = %record_type,
                columns = ?extra,
                "ignoring extra columns"
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            stage,
            positions,
            records: reader.into_records(),
        })
    }

    pub fn record_type(&self) -> RecordType {
        self.stage.record_type
    }

    pub fn stage(&self) -> &'static Stage {
        self.stage
    }

    fn to_row(&self, record: &StringRecord, fallback_line: u64) -> RawRow {
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(fallback_line);
        RawRow {
            line,
            values: self
                .positions
                .iter()
                .map(|&(name, idx)| (name, record.get(idx).unwrap_or("").trim().to_string()))
                .collect(),
        }
    }
}

impl Iterator for StageReader {
    type Item = Result<RawRow, MalformedFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        let fallback_line = self.records.reader().position().line() + 1;
        let item = match self.records.next()? {
            Ok(record) => Ok(self.to_row(&record, fallback_line)),
            Err(e) => Err(MalformedFileError {
                path: self.path.clone(),
                record_type: self.stage.record_type,
                reason: reason_for(&e),
            }),
        };
        Some(item)
    }
}

/// Build a map from header name to column index
pub fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_lowercase(), i))
        .collect()
}

fn reason_for(err: &csv::Error) -> MalformedReason {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.kind() {
        ErrorKind::Io(e) => MalformedReason::Unreadable(e.to_string()),
        ErrorKind::Utf8 { err, .. } => MalformedReason::Encoding {
            line,
            message: err.to_string(),
        },
        ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => MalformedReason::Csv {
            line,
            message: format!("expected {} fields, found {}", expected_len, len),
        },
        _ => MalformedReason::Csv {
            line,
            message: err.to_string(),
        },
    }
}
