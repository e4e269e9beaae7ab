//! Data models for registry-import
//!
//! - Uploaded row shape and normalization
//! - Validated facility/snapshot attributes
//! - Import workflow state machine and results

pub mod facility;
pub mod import_result;
pub mod import_session;
pub mod row;

pub use facility::{CoverageType, Environment, FacilityAttributes, ImportRow, SnapshotAttributes};
pub use import_result::{ImportOutcome, IssueKind, IssueSeverity, RowIssue};
pub use import_session::{ImportSession, ImportState, StateTransition};
pub use row::{Column, RawRow, RowFields};
