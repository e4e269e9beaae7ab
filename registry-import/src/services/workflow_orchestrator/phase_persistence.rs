//! Phases 5-8: CREATE, UPDATE, BOUNDARY_FILTER, MATERIALIZE_HISTORY
//!
//! Every write of the run happens here. Nothing before this module touches
//! storage except for reads.

use registry_common::db::Region;

use super::WorkflowOrchestrator;
use crate::error::ImportResult;
use crate::models::{ImportRow, ImportSession, ImportState};
use crate::services::PersistenceCoordinator;

impl WorkflowOrchestrator {
    pub(super) async fn phase_persistence(
        &self,
        session: &mut ImportSession,
        region: &Region,
        mut rows: Vec<ImportRow>,
    ) -> ImportResult<()> {
        let coordinator = PersistenceCoordinator::new(self.store.clone(), &self.settings);

        session.transition_to(ImportState::Create);
        let created = coordinator.create(region.id, &mut rows).await?;
        tracing::info!(session_id = %session.session_id, created, "Phase 5: CREATE complete");

        session.transition_to(ImportState::Update);
        let updated = coordinator.update(&mut rows).await?;
        tracing::info!(session_id = %session.session_id, updated, "Phase 6: UPDATE complete");

        session.transition_to(ImportState::BoundaryFilter);
        let (rows, outside) = coordinator.remove_outside_boundary(region, rows).await?;
        tracing::info!(
            session_id = %session.session_id,
            dropped = outside.len(),
            "Phase 7: BOUNDARY_FILTER complete"
        );
        session.record_all(outside);

        session.transition_to(ImportState::MaterializeHistory);
        session.processed_count = rows.len();
        let snapshots = coordinator.materialize_history(&rows, session.period).await?;
        tracing::info!(
            session_id = %session.session_id,
            snapshots,
            period = %session.period,
            "Phase 8: MATERIALIZE_HISTORY complete"
        );

        Ok(())
    }
}
