//! Row issues and import results
//!
//! Every problem found in an uploaded row is recorded as a `RowIssue`. Errors
//! can abort the run (unless `ignore_errors` is set); warnings never do.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Reported, row kept or dropped, import continues
    Warning,
    /// Row rejected; halts the import unless errors are ignored
    Error,
}

/// Issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueKind {
    /// Required column(s) missing
    Schema,
    /// Numeric or point parsing failed
    Type,
    /// Length or vocabulary violation
    Constraint,
    /// Zero point, outside region, too close to another facility
    Semantic,
    /// External id or name repeated within one upload
    Duplicate,
}

/// A problem attached to one uploaded row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    /// 1-based file line (header is line 1)
    pub row_index: usize,
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub message: String,
}

impl RowIssue {
    fn error(row_index: usize, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            row_index,
            kind,
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    pub fn schema(row_index: usize, message: impl Into<String>) -> Self {
        Self::error(row_index, IssueKind::Schema, message)
    }

    pub fn type_error(row_index: usize, message: impl Into<String>) -> Self {
        Self::error(row_index, IssueKind::Type, message)
    }

    pub fn constraint(row_index: usize, message: impl Into<String>) -> Self {
        Self::error(row_index, IssueKind::Constraint, message)
    }

    pub fn semantic(row_index: usize, message: impl Into<String>) -> Self {
        Self::error(row_index, IssueKind::Semantic, message)
    }

    /// Duplicate entries are always warnings
    pub fn duplicate(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index,
            kind: IssueKind::Duplicate,
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    /// Tolerated constraint violation (value coerced, row kept)
    pub fn coerced(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            row_index,
            kind: IssueKind::Constraint,
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == IssueSeverity::Warning
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row_index, self.message)
    }
}

/// Terminal result of one import run: `(warnings, errors, processed_count)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Rows that reached history materialization; 0 when the run halted
    pub processed_count: usize,
}

impl ImportOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// File-import report: errors, then a `Warnings:` section if any
    pub fn report(&self) -> String {
        let mut report = self.errors.join("\n");
        if !self.warnings.is_empty() {
            report.push_str("\nWarnings:\n");
            report.push_str(&self.warnings.join("\n"));
        }
        report
    }
}
