//! Phase 4: SPATIAL_DEDUP

use super::WorkflowOrchestrator;
use crate::error::ImportResult;
use crate::models::{ImportRow, ImportSession, ImportState};
use crate::services::SpatialDeduplicator;

impl WorkflowOrchestrator {
    /// Reject new facilities closer than the threshold to another facility
    ///
    /// The indexes live only for this call.
    pub(super) async fn phase_dedup(
        &self,
        session: &mut ImportSession,
        region_id: i64,
        rows: Vec<ImportRow>,
    ) -> ImportResult<Vec<ImportRow>> {
        session.transition_to(ImportState::SpatialDedup);
        tracing::info!(session_id = %session.session_id, "Phase 4: SPATIAL_DEDUP");

        if rows.iter().all(|r| !r.is_new()) {
            return Ok(rows);
        }

        let existing = self.store.facility_points(region_id).await?;
        let deduplicator = SpatialDeduplicator::new(self.settings.min_distance_km);
        let (rows, errors) = deduplicator.filter(&existing, rows);

        tracing::info!(
            session_id = %session.session_id,
            existing = existing.len(),
            rejected = errors.len(),
            "Spatial dedup complete"
        );
        session.record_all(errors);
        Ok(rows)
    }
}
