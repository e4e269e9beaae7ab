//! Registry storage for the import pipeline
//!
//! The pipeline only talks to storage through `RegistryStore`. Every method
//! is a single set-based operation; callers do the chunking. `SqliteRegistryStore`
//! is the production implementation, `MemoryRegistryStore` backs unit tests.

pub mod memory;
pub mod sessions;
pub mod sqlite;

pub use memory::MemoryRegistryStore;
pub use sqlite::SqliteRegistryStore;

use async_trait::async_trait;
use registry_common::db::{FacilityField, FacilityPoint, FacilityRecord, Region, SnapshotRecord};
use registry_common::time::ImportPeriod;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::ImportResult;

/// Facility and snapshot storage consumed by the import pipeline
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Facilities of `region_id` whose (lower-cased) external id is in `external_ids`
    async fn find_by_external_ids(
        &self,
        region_id: i64,
        external_ids: &[String],
    ) -> ImportResult<Vec<FacilityRecord>>;

    /// Facilities of `region_id` whose `name_lower` is in `names`
    async fn find_by_names(&self, region_id: i64, names: &[String]) -> ImportResult<Vec<FacilityRecord>>;

    /// Location and education level of every facility in the region
    async fn facility_points(&self, region_id: i64) -> ImportResult<Vec<FacilityPoint>>;

    async fn create_facilities(&self, facilities: &[FacilityRecord]) -> ImportResult<()>;

    /// Write only the columns behind `fields` for each facility
    async fn update_facilities(
        &self,
        fields: &[FacilityField],
        facilities: &[FacilityRecord],
    ) -> ImportResult<()>;

    /// Delete every facility of the region outside its boundary; returns the count
    async fn delete_outside_boundary(&self, region: &Region) -> ImportResult<u64>;

    /// Subset of `ids` that still exists
    async fn existing_facility_ids(&self, ids: &[Uuid]) -> ImportResult<HashSet<Uuid>>;

    /// Per facility, the latest snapshot with a period strictly before `period`
    async fn latest_snapshots_before(
        &self,
        facility_ids: &[Uuid],
        period: ImportPeriod,
    ) -> ImportResult<HashMap<Uuid, SnapshotRecord>>;

    /// Delete the snapshots of `facility_ids` for exactly `period`
    async fn delete_snapshots(&self, facility_ids: &[Uuid], period: ImportPeriod) -> ImportResult<u64>;

    async fn create_snapshots(&self, snapshots: &[SnapshotRecord]) -> ImportResult<()>;

    /// Point each facility at a snapshot: `(facility_id, snapshot_id)`
    ///
    /// A pointer is left alone when the facility already has a snapshot for a
    /// later period, so it always references the most recent one.
    async fn set_latest_snapshots(&self, pointers: &[(Uuid, Uuid)]) -> ImportResult<()>;
}
