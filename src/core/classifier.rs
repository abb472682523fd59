//! File classification by name fragment
//!
//! Maps uploaded file names onto record types using an ordered priority list
//! of `(record type, fragment)` rules. Matching is a case-insensitive
//! substring test and the first rule that matches wins, so more specific
//! fragments (e.g. "allocation") must be listed before generic ones
//! ("project").

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::record::RecordType;

/// One entry of the classifier priority list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeRule {
    pub record_type: RecordType,
    pub fragment: String,
}

impl FileTypeRule {
    pub fn new(record_type: RecordType, fragment: impl Into<String>) -> Self {
        Self {
            record_type,
            fragment: fragment.into(),
        }
    }
}

/// Default priority list
pub fn default_rules() -> Vec<FileTypeRule> {
    vec![
        FileTypeRule::new(RecordType::Timesheet, "timesheet"),
        FileTypeRule::new(RecordType::ProjectAllocation, "allocation"),
        FileTypeRule::new(RecordType::Designation, "designation"),
        FileTypeRule::new(RecordType::Department, "department"),
        FileTypeRule::new(RecordType::Employee, "employee"),
        FileTypeRule::new(RecordType::Project, "project"),
    ]
}

/// A file whose name matched a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    pub record_type: RecordType,
    /// Where the contents are read from
    pub path: PathBuf,
    /// Name as submitted; unchanged when the file is archived
    pub name: String,
}

impl ClassifiedFile {
    pub fn new(record_type: RecordType, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            record_type,
            name: file_name_of(&path),
            path,
        }
    }

    /// Submitted file name, for display and the ledger
    pub fn file_name(&self) -> String {
        self.name.clone()
    }

    /// Read from another location while keeping the submitted name
    pub fn relocated(self, path: PathBuf) -> Self {
        Self { path, ..self }
    }
}

/// A file whose name matched no rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationMiss {
    pub file_name: String,
}

/// Result of classifying a set of uploaded files
#[derive(Debug, Default)]
pub struct Classification {
    pub recognized: Vec<ClassifiedFile>,
    pub unrecognized: Vec<ClassificationMiss>,
}

/// Pure file name -> record type mapper
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<FileTypeRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Classifier {
    pub fn new(rules: Vec<FileTypeRule>) -> Self {
        // Fragments are compared lowercased; an empty fragment would match everything
        let rules = rules
            .into_iter()
            .filter(|r| !r.fragment.trim().is_empty())
            .map(|r| FileTypeRule::new(r.record_type, r.fragment.trim().to_lowercase()))
            .collect();
        Self { rules }
    }

    /// The effective priority list
    pub fn rules(&self) -> &[FileTypeRule] {
        &self.rules
    }

    /// Classify a single file name
    pub fn classify_name(&self, file_name: &str) -> Option<RecordType> {
        let name = file_name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| name.contains(&rule.fragment))
            .map(|rule| rule.record_type)
    }

    /// Classify uploaded paths, keeping input order within each bucket
    pub fn classify<I, P>(&self, paths: I) -> Classification
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut out = Classification::default();
        for path in paths {
            let path = path.as_ref();
            let name = file_name_of(path);
            match self.classify_name(&name) {
                Some(record_type) => out.recognized.push(ClassifiedFile::new(record_type, path)),
                None => out.unrecognized.push(ClassificationMiss { file_name: name }),
            }
        }
        out
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
