//! In-memory registry store
//!
//! Same semantics as the SQLite store (region scoping, cascade on facility
//! delete, pointer reset on snapshot delete) over plain vectors. Used by
//! unit tests.

use async_trait::async_trait;
use registry_common::db::{FacilityField, FacilityPoint, FacilityRecord, Region, SnapshotRecord};
use registry_common::time::ImportPeriod;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RegistryStore;
use crate::error::ImportResult;

#[derive(Default)]
struct Tables {
    /// Insertion order kept for deterministic lookups
    facilities: Vec<FacilityRecord>,
    snapshots: Vec<SnapshotRecord>,
}

/// Registry store held entirely in memory
#[derive(Default)]
pub struct MemoryRegistryStore {
    tables: RwLock<Tables>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `facilities`
    pub fn with_facilities(facilities: Vec<FacilityRecord>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                facilities,
                snapshots: Vec::new(),
            }),
        }
    }

    pub async fn facilities(&self) -> Vec<FacilityRecord> {
        self.tables.read().await.facilities.clone()
    }

    pub async fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.tables.read().await.snapshots.clone()
    }
}

fn copy_field(target: &mut FacilityRecord, source: &FacilityRecord, field: FacilityField) {
    match field {
        FacilityField::ExternalId => target.external_id = source.external_id.clone(),
        FacilityField::Name => {
            target.name = source.name.clone();
            target.name_lower = source.name_lower.clone();
        }
        FacilityField::Point => target.point = source.point,
        FacilityField::Admin1Name => target.admin_1_name = source.admin_1_name.clone(),
        FacilityField::Admin2Name => target.admin_2_name = source.admin_2_name.clone(),
        FacilityField::Admin3Name => target.admin_3_name = source.admin_3_name.clone(),
        FacilityField::Admin4Name => target.admin_4_name = source.admin_4_name.clone(),
        FacilityField::EducationLevel => target.education_level = source.education_level.clone(),
        FacilityField::Environment => target.environment = source.environment.clone(),
        FacilityField::SchoolType => target.school_type = source.school_type.clone(),
        FacilityField::Address => target.address = source.address.clone(),
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn find_by_external_ids(
        &self,
        region_id: i64,
        external_ids: &[String],
    ) -> ImportResult<Vec<FacilityRecord>> {
        let wanted: HashSet<String> = external_ids.iter().map(|id| id.to_lowercase()).collect();
        let tables = self.tables.read().await;
        Ok(tables
            .facilities
            .iter()
            .filter(|f| f.region_id == region_id && wanted.contains(&f.external_id))
            .cloned()
            .collect())
    }

    async fn find_by_names(&self, region_id: i64, names: &[String]) -> ImportResult<Vec<FacilityRecord>> {
        let wanted: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let tables = self.tables.read().await;
        Ok(tables
            .facilities
            .iter()
            .filter(|f| f.region_id == region_id && wanted.contains(&f.name_lower))
            .cloned()
            .collect())
    }

    async fn facility_points(&self, region_id: i64) -> ImportResult<Vec<FacilityPoint>> {
        let tables = self.tables.read().await;
        Ok(tables
            .facilities
            .iter()
            .filter(|f| f.region_id == region_id)
            .map(|f| FacilityPoint {
                id: f.id,
                education_level: f.education_level.clone(),
                point: f.point,
            })
            .collect())
    }

    async fn create_facilities(&self, facilities: &[FacilityRecord]) -> ImportResult<()> {
        self.tables.write().await.facilities.extend_from_slice(facilities);
        Ok(())
    }

    async fn update_facilities(
        &self,
        fields: &[FacilityField],
        facilities: &[FacilityRecord],
    ) -> ImportResult<()> {
        let updates: HashMap<Uuid, &FacilityRecord> = facilities.iter().map(|f| (f.id, f)).collect();
        let mut tables = self.tables.write().await;
        for stored in tables.facilities.iter_mut() {
            if let Some(source) = updates.get(&stored.id) {
                for field in fields {
                    copy_field(stored, source, *field);
                }
            }
        }
        Ok(())
    }

    async fn delete_outside_boundary(&self, region: &Region) -> ImportResult<u64> {
        let mut tables = self.tables.write().await;
        let outside: HashSet<Uuid> = tables
            .facilities
            .iter()
            .filter(|f| f.region_id == region.id && !region.boundary.contains(&f.point))
            .map(|f| f.id)
            .collect();

        tables.facilities.retain(|f| !outside.contains(&f.id));
        tables.snapshots.retain(|s| !outside.contains(&s.facility_id));
        Ok(outside.len() as u64)
    }

    async fn existing_facility_ids(&self, ids: &[Uuid]) -> ImportResult<HashSet<Uuid>> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let tables = self.tables.read().await;
        Ok(tables
            .facilities
            .iter()
            .filter(|f| wanted.contains(&f.id))
            .map(|f| f.id)
            .collect())
    }

    async fn latest_snapshots_before(
        &self,
        facility_ids: &[Uuid],
        period: ImportPeriod,
    ) -> ImportResult<HashMap<Uuid, SnapshotRecord>> {
        let wanted: HashSet<&Uuid> = facility_ids.iter().collect();
        let tables = self.tables.read().await;

        let mut latest: HashMap<Uuid, SnapshotRecord> = HashMap::new();
        for snapshot in &tables.snapshots {
            if !wanted.contains(&snapshot.facility_id) || snapshot.period >= period {
                continue;
            }
            let newer = latest
                .get(&snapshot.facility_id)
                .map_or(true, |current| snapshot.period > current.period);
            if newer {
                latest.insert(snapshot.facility_id, snapshot.clone());
            }
        }
        Ok(latest)
    }

    async fn delete_snapshots(&self, facility_ids: &[Uuid], period: ImportPeriod) -> ImportResult<u64> {
        let wanted: HashSet<&Uuid> = facility_ids.iter().collect();
        let mut tables = self.tables.write().await;

        let removed: HashSet<Uuid> = tables
            .snapshots
            .iter()
            .filter(|s| s.period == period && wanted.contains(&s.facility_id))
            .map(|s| s.id)
            .collect();
        tables.snapshots.retain(|s| !removed.contains(&s.id));

        // ON DELETE SET NULL
        for facility in tables.facilities.iter_mut() {
            if facility.latest_snapshot_id.is_some_and(|id| removed.contains(&id)) {
                facility.latest_snapshot_id = None;
            }
        }
        Ok(removed.len() as u64)
    }

    async fn create_snapshots(&self, snapshots: &[SnapshotRecord]) -> ImportResult<()> {
        self.tables.write().await.snapshots.extend_from_slice(snapshots);
        Ok(())
    }

    async fn set_latest_snapshots(&self, pointers: &[(Uuid, Uuid)]) -> ImportResult<()> {
        let pointers: HashMap<Uuid, Uuid> = pointers.iter().copied().collect();
        let mut tables = self.tables.write().await;
        let Tables {
            facilities,
            snapshots,
        } = &mut *tables;

        let period_of = |id: Uuid| snapshots.iter().find(|s| s.id == id).map(|s| s.period);
        for facility in facilities.iter_mut() {
            let Some(snapshot_id) = pointers.get(&facility.id) else {
                continue;
            };
            let superseded = period_of(*snapshot_id).is_some_and(|period| {
                snapshots
                    .iter()
                    .any(|s| s.facility_id == facility.id && s.period > period)
            });
            if !superseded {
                facility.latest_snapshot_id = Some(*snapshot_id);
            }
        }
        Ok(())
    }
}
