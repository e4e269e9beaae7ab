//! Service modules for the facility import pipeline
//!
//! - `RowValidator`: one raw row to typed attributes
//! - `IdentityResolver`: match rows to stored facilities
//! - `SpatialDeduplicator`: minimum distance between facilities
//! - `PersistenceCoordinator`: bulk writes, boundary cleanup, history
//! - `WorkflowOrchestrator`: sequences the above

pub mod cache_invalidator;
pub mod identity_resolver;
pub mod persistence_coordinator;
pub mod row_validator;
pub mod spatial_deduplicator;
pub mod spatial_index;
pub mod workflow_orchestrator;

pub use cache_invalidator::CacheInvalidator;
pub use identity_resolver::{find_duplicates, IdentityResolver};
pub use persistence_coordinator::PersistenceCoordinator;
pub use row_validator::{RowValidation, RowValidator};
pub use spatial_deduplicator::SpatialDeduplicator;
pub use spatial_index::{cartesian, KdTree};
pub use workflow_orchestrator::WorkflowOrchestrator;
