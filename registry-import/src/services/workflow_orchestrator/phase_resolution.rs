//! Phases 2-3: RESOLVE_BY_EXTERNAL_ID, RESOLVE_BY_NAME

use super::WorkflowOrchestrator;
use crate::error::ImportResult;
use crate::models::{ImportRow, ImportSession, ImportState};
use crate::services::identity_resolver::{find_duplicates, IdentityResolver};

impl WorkflowOrchestrator {
    /// Drop in-upload duplicates, then attach stored facilities by external
    /// id and by name
    pub(super) async fn phase_resolution(
        &self,
        session: &mut ImportSession,
        region_id: i64,
        rows: Vec<ImportRow>,
    ) -> ImportResult<Vec<ImportRow>> {
        let resolver = IdentityResolver::new(self.store.clone(), self.settings.lookup_chunk_size);

        session.transition_to(ImportState::ResolveByExternalId);
        tracing::info!(session_id = %session.session_id, "Phase 2: RESOLVE_BY_EXTERNAL_ID");

        let (mut rows, duplicates) = find_duplicates(rows);
        if !duplicates.is_empty() {
            tracing::warn!(
                session_id = %session.session_id,
                count = duplicates.len(),
                "Duplicate rows dropped"
            );
        }
        session.record_all(duplicates);

        let by_id = resolver.resolve_by_external_id(region_id, &mut rows).await?;

        session.transition_to(ImportState::ResolveByName);
        tracing::info!(session_id = %session.session_id, "Phase 3: RESOLVE_BY_NAME");

        let by_name = resolver.resolve_by_name(region_id, &mut rows).await?;

        tracing::info!(
            session_id = %session.session_id,
            by_external_id = by_id,
            by_name,
            new = rows.iter().filter(|r| r.is_new()).count(),
            "Identity resolution complete"
        );
        Ok(rows)
    }
}
