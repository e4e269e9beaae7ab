//! Import workflow orchestrator
//!
//! Coordinates one import run through all states
//!
//! # State Progression
//! VALIDATE → RESOLVE_BY_EXTERNAL_ID → RESOLVE_BY_NAME → SPATIAL_DEDUP →
//! CREATE → UPDATE → BOUNDARY_FILTER → MATERIALIZE_HISTORY → DONE
//!
//! # Architecture
//! Each group of states is handled by a `phase_*` method in its own module:
//!
//! - **VALIDATE** (`phase_validation`): normalize and validate raw rows
//! - **RESOLVE_BY_*** (`phase_resolution`): in-upload duplicates, then
//!   external id and name lookups
//! - **SPATIAL_DEDUP** (`phase_dedup`): minimum distance for new facilities
//! - **CREATE .. MATERIALIZE_HISTORY** (`phase_persistence`): writes
//!
//! Row errors and warnings accumulate on the session. After VALIDATE and
//! SPATIAL_DEDUP the run halts with nothing written if errors exist and the
//! session does not ignore them. Storage failures are not caught: the session
//! moves to FAILED and the error is returned.

use registry_common::config::ImportSettings;
use registry_common::db::Region;
use registry_common::events::{EventBus, RegistryEvent};
use registry_common::time::ImportPeriod;
use std::sync::Arc;

use crate::db::RegistryStore;
use crate::error::{ImportError, ImportResult};
use crate::models::{ImportOutcome, ImportSession, ImportState, RawRow};
use crate::services::CacheInvalidator;

// Phase modules (internal implementation)
mod phase_dedup;
mod phase_persistence;
mod phase_resolution;
mod phase_validation;

/// Rows between progress log lines
const PROGRESS_INTERVAL: usize = 1000;

/// Workflow orchestrator service
pub struct WorkflowOrchestrator {
    store: Arc<dyn RegistryStore>,
    event_bus: EventBus,
    cache: Arc<dyn CacheInvalidator>,
    settings: ImportSettings,
}

impl WorkflowOrchestrator {
    /// Create new workflow orchestrator
    ///
    /// # Arguments
    /// * `store` - Facility and snapshot storage
    /// * `event_bus` - Event bus for session events; also used for cache invalidation
    /// * `settings` - Chunk sizes, dedup threshold
    pub fn new(store: Arc<dyn RegistryStore>, event_bus: EventBus, settings: ImportSettings) -> Self {
        let cache: Arc<dyn CacheInvalidator> = Arc::new(event_bus.clone());
        Self {
            store,
            event_bus,
            cache,
            settings,
        }
    }

    /// Replace the cache invalidation collaborator
    pub fn with_cache_invalidator(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import `rows` into `region` for the current ISO week
    pub async fn run_import(
        &self,
        region: &Region,
        rows: Vec<RawRow>,
        ignore_errors: bool,
    ) -> ImportResult<ImportOutcome> {
        self.run_import_for_period(region, rows, ignore_errors, ImportPeriod::current())
            .await
    }

    /// Import `rows` into `region`, writing snapshots for `period`
    pub async fn run_import_for_period(
        &self,
        region: &Region,
        rows: Vec<RawRow>,
        ignore_errors: bool,
        period: ImportPeriod,
    ) -> ImportResult<ImportOutcome> {
        let mut session = ImportSession::new(region.id, period, ignore_errors);
        self.execute(&mut session, region, rows).await?;
        Ok(session.outcome())
    }

    /// Execute complete import workflow on a caller-owned session
    ///
    /// The session is left in DONE or FAILED.
    pub async fn execute(
        &self,
        session: &mut ImportSession,
        region: &Region,
        rows: Vec<RawRow>,
    ) -> ImportResult<()> {
        if session.region_id != region.id {
            return Err(ImportError::Common(registry_common::Error::InvalidInput(format!(
                "Session {} belongs to region {}, not {}",
                session.session_id, session.region_id, region.id
            ))));
        }

        tracing::info!(
            session_id = %session.session_id,
            region_id = region.id,
            period = %session.period,
            rows = rows.len(),
            ignore_errors = session.ignore_errors,
            "Starting import workflow"
        );
        self.event_bus.emit_lossy(RegistryEvent::ImportSessionStarted {
            session_id: session.session_id,
            region_id: region.id,
            timestamp: registry_common::time::now(),
        });

        let result = self.run_phases(session, region, rows).await;
        if let Err(e) = &result {
            tracing::error!(session_id = %session.session_id, error = %e, "Import workflow failed");
            session.transition_to(ImportState::Failed);
        }

        self.event_bus.emit_lossy(RegistryEvent::ImportSessionCompleted {
            session_id: session.session_id,
            region_id: region.id,
            processed_count: session.processed_count,
            error_count: session.errors.len(),
            warning_count: session.warnings.len(),
            timestamp: registry_common::time::now(),
        });

        result
    }

    async fn run_phases(
        &self,
        session: &mut ImportSession,
        region: &Region,
        rows: Vec<RawRow>,
    ) -> ImportResult<()> {
        let rows = self.phase_validation(session, rows);
        if session.should_halt() {
            self.halt(session);
            return Ok(());
        }

        let rows = self.phase_resolution(session, region.id, rows).await?;

        let rows = self.phase_dedup(session, region.id, rows).await?;
        if session.should_halt() {
            self.halt(session);
            return Ok(());
        }

        self.phase_persistence(session, region, rows).await?;

        session.transition_to(ImportState::Done);
        self.cache.invalidate(region.id);

        tracing::info!(
            session_id = %session.session_id,
            processed = session.processed_count,
            errors = session.errors.len(),
            warnings = session.warnings.len(),
            "Import workflow completed"
        );
        Ok(())
    }

    /// Stop before any write
    fn halt(&self, session: &mut ImportSession) {
        tracing::warn!(
            session_id = %session.session_id,
            state = ?session.state,
            errors = session.errors.len(),
            "Halting import on row errors"
        );
        session.processed_count = 0;
        session.transition_to(ImportState::Done);
    }
}
