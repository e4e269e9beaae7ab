//! Phase 1: VALIDATE
//!
//! Raw rows are normalized into `RowFields` and validated one at a time.
//! Rows are numbered as file lines: the header is line 1, so the first data
//! row is row 2.

use super::{WorkflowOrchestrator, PROGRESS_INTERVAL};
use crate::models::{ImportRow, ImportSession, ImportState, RawRow, RowFields};
use crate::services::RowValidator;

impl WorkflowOrchestrator {
    /// Phase 1: VALIDATE - Turn raw rows into typed pipeline rows
    ///
    /// Blank rows are skipped silently. Issues land on the
    /// session; only rows without errors are returned.
    pub(super) fn phase_validation(
        &self,
        session: &mut ImportSession,
        raw_rows: Vec<RawRow>,
    ) -> Vec<ImportRow> {
        session.transition_to(ImportState::Validate);
        tracing::info!(session_id = %session.session_id, "Phase 1: VALIDATE");

        let total = raw_rows.len();
        let mut rows = Vec::with_capacity(total);
        let mut skipped = 0usize;

        for (i, raw) in raw_rows.iter().enumerate() {
            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    session_id = %session.session_id,
                    validated = i,
                    total,
                    "Validation progress"
                );
            }

            let row_index = i + 2;
            let fields = RowFields::from_raw(raw);
            if fields.is_blank() {
                skipped += 1;
                continue;
            }

            let validation = RowValidator::validate(row_index, &fields);
            session.record_all(validation.warnings.iter().cloned());
            session.record_all(validation.errors.iter().cloned());
            if let Some(row) = validation.into_row(row_index) {
                rows.push(row);
            }
        }

        tracing::info!(
            session_id = %session.session_id,
            valid = rows.len(),
            skipped,
            errors = session.errors.len(),
            warnings = session.warnings.len(),
            "Validation complete"
        );
        rows
    }
}
