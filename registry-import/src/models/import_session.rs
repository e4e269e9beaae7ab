//! Import workflow state machine
//!
//! An import session progresses through fixed states:
//! VALIDATE → RESOLVE_BY_EXTERNAL_ID → RESOLVE_BY_NAME → SPATIAL_DEDUP →
//! CREATE → UPDATE → BOUNDARY_FILTER → MATERIALIZE_HISTORY → DONE
//!
//! A run that halts on errors jumps straight to DONE; an uncaught storage
//! failure ends in FAILED.

use chrono::{DateTime, Utc};
use registry_common::time::ImportPeriod;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ImportOutcome, RowIssue};

/// Import workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportState {
    /// Row normalization and validation
    Validate,
    /// In-upload duplicate check, lookup by external id
    ResolveByExternalId,
    /// Lookup by lower-cased name
    ResolveByName,
    /// Minimum-distance check for new facilities
    SpatialDedup,
    /// Bulk insert of new facilities
    Create,
    /// Bulk update of matched facilities
    Update,
    /// Delete facilities outside the region boundary
    BoundaryFilter,
    /// Weekly snapshot carry-forward
    MaterializeHistory,
    /// Import finished (successfully or halted on row errors)
    Done,
    /// Import aborted by a storage failure
    Failed,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: ImportState,
    pub new_state: ImportState,
    pub transitioned_at: DateTime<Utc>,
}

/// Import session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Region whose facilities are being imported
    pub region_id: i64,

    /// ISO week snapshots are written for
    pub period: ImportPeriod,

    /// Persist surviving rows despite row errors
    pub ignore_errors: bool,

    /// Current workflow state
    pub state: ImportState,

    /// Accumulated warnings
    pub warnings: Vec<RowIssue>,

    /// Accumulated errors
    pub errors: Vec<RowIssue>,

    /// Rows that reached history materialization
    pub processed_count: usize,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time (if done/failed)
    pub ended_at: Option<DateTime<Utc>>,
}

impl ImportSession {
    /// Create new import session
    pub fn new(region_id: i64, period: ImportPeriod, ignore_errors: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            region_id,
            period,
            ignore_errors,
            state: ImportState::Validate,
            warnings: Vec::new(),
            errors: Vec::new(),
            processed_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ImportState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal states
        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// File an issue under errors or warnings by severity
    pub fn record(&mut self, issue: RowIssue) {
        if issue.is_warning() {
            self.warnings.push(issue);
        } else {
            self.errors.push(issue);
        }
    }

    pub fn record_all(&mut self, issues: impl IntoIterator<Item = RowIssue>) {
        for issue in issues {
            self.record(issue);
        }
    }

    /// Errors were reported and the caller did not ask to ignore them
    pub fn should_halt(&self) -> bool {
        !self.ignore_errors && !self.errors.is_empty()
    }

    /// Check if session is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ImportState::Done | ImportState::Failed)
    }

    /// `(warnings, errors, processed_count)` with rendered messages
    pub fn outcome(&self) -> ImportOutcome {
        ImportOutcome {
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
            processed_count: self.processed_count,
        }
    }
}
