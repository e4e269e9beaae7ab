//! Facility and snapshot persistence
//!
//! Runs after validation, identity resolution and spatial dedup:
//! 1. create facilities for unmatched rows
//! 2. update matched facilities, one bulk call per set of supplied fields
//! 3. delete every facility of the region outside its boundary and drop the
//!    rows whose facility disappeared
//! 4. write this period's snapshot per facility, carrying forward the latest
//!    earlier snapshot's values
//!
//! Stages are not wrapped in one transaction. Boundary cleanup is a
//! compensating delete: between steps 2 and 3 facilities outside the
//! boundary are briefly visible.

use registry_common::config::ImportSettings;
use registry_common::db::{FacilityField, FacilityRecord, Region, SnapshotRecord};
use registry_common::time::ImportPeriod;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::RegistryStore;
use crate::error::ImportResult;
use crate::models::{ImportRow, RowIssue};

pub const OUTSIDE_BOUNDARY_MESSAGE: &str =
    "Bad data provided for geopoint: point outside region boundary";

/// Bulk writes for one import run
pub struct PersistenceCoordinator {
    store: Arc<dyn RegistryStore>,
    lookup_chunk_size: usize,
    write_batch_size: usize,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn RegistryStore>, settings: &ImportSettings) -> Self {
        Self {
            store,
            lookup_chunk_size: settings.lookup_chunk_size.max(1),
            write_batch_size: settings.write_batch_size.max(1),
        }
    }

    /// Insert a facility for every unmatched row; returns the number created
    pub async fn create(&self, region_id: i64, rows: &mut [ImportRow]) -> ImportResult<usize> {
        let mut records = Vec::new();
        for row in rows.iter_mut().filter(|r| r.is_new()) {
            let record = row.facility.to_record(region_id);
            row.facility_id = Some(record.id);
            records.push(record);
        }

        for batch in records.chunks(self.write_batch_size) {
            self.store.create_facilities(batch).await?;
            tracing::debug!(region_id, count = batch.len(), "Created facility batch");
        }

        Ok(records.len())
    }

    /// Write the supplied fields of every matched row; returns the number updated
    pub async fn update(&self, rows: &mut [ImportRow]) -> ImportResult<usize> {
        let mut groups: BTreeMap<Vec<FacilityField>, Vec<FacilityRecord>> = BTreeMap::new();
        let mut updated = 0;

        for row in rows.iter_mut() {
            let Some(existing) = &row.existing else {
                continue;
            };
            let mut record = existing.clone();
            row.facility.apply_to(&mut record);
            row.facility_id = Some(record.id);
            groups
                .entry(row.facility.present_fields())
                .or_default()
                .push(record);
            updated += 1;
        }

        for (fields, records) in &groups {
            for batch in records.chunks(self.write_batch_size) {
                self.store.update_facilities(fields, batch).await?;
                tracing::debug!(
                    fields = ?fields,
                    count = batch.len(),
                    "Updated facility batch"
                );
            }
        }

        Ok(updated)
    }

    /// Delete facilities outside the region and drop the rows that pointed at them
    pub async fn remove_outside_boundary(
        &self,
        region: &Region,
        rows: Vec<ImportRow>,
    ) -> ImportResult<(Vec<ImportRow>, Vec<RowIssue>)> {
        let deleted = self.store.delete_outside_boundary(region).await?;
        if deleted == 0 {
            return Ok((rows, Vec::new()));
        }
        tracing::info!(region_id = region.id, deleted, "Removed facilities outside region boundary");

        let ids: Vec<Uuid> = unique_ids(&rows);
        let mut surviving: HashSet<Uuid> = HashSet::with_capacity(ids.len());
        for chunk in ids.chunks(self.lookup_chunk_size) {
            surviving.extend(self.store.existing_facility_ids(chunk).await?);
        }

        let mut kept = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();
        for row in rows {
            match row.facility_id {
                Some(id) if !surviving.contains(&id) => {
                    errors.push(RowIssue::semantic(row.row_index, OUTSIDE_BOUNDARY_MESSAGE));
                }
                _ => kept.push(row),
            }
        }

        Ok((kept, errors))
    }

    /// Write one snapshot for `period` per facility touched by `rows`
    ///
    /// Returns the number of snapshots written. When several rows hit the
    /// same facility the last row's values win.
    pub async fn materialize_history(
        &self,
        rows: &[ImportRow],
        period: ImportPeriod,
    ) -> ImportResult<usize> {
        let ids = unique_ids(rows);
        let latest_row: HashMap<Uuid, &ImportRow> = rows
            .iter()
            .filter_map(|row| row.facility_id.map(|id| (id, row)))
            .collect();

        let mut prior: HashMap<Uuid, SnapshotRecord> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(self.lookup_chunk_size) {
            prior.extend(self.store.latest_snapshots_before(chunk, period).await?);
        }

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(row) = latest_row.get(id) else {
                continue;
            };
            let mut snapshot = match prior.get(id) {
                Some(previous) => previous.carried_forward(period),
                None => SnapshotRecord::new(*id, period),
            };
            row.snapshot.apply_to(&mut snapshot);
            snapshots.push(snapshot);
        }
        tracing::debug!(
            period = %period,
            carried_forward = prior.len(),
            total = snapshots.len(),
            "Built period snapshots"
        );

        for chunk in ids.chunks(self.lookup_chunk_size) {
            self.store.delete_snapshots(chunk, period).await?;
        }
        for batch in snapshots.chunks(self.write_batch_size) {
            self.store.create_snapshots(batch).await?;
        }

        let pointers: Vec<(Uuid, Uuid)> = snapshots.iter().map(|s| (s.facility_id, s.id)).collect();
        for batch in pointers.chunks(self.write_batch_size) {
            self.store.set_latest_snapshots(batch).await?;
        }

        Ok(snapshots.len())
    }
}

/// Facility ids of `rows` in first-seen order without repeats
fn unique_ids(rows: &[ImportRow]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.facility_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRegistryStore;
    use crate::models::{FacilityAttributes, SnapshotAttributes};
    use registry_common::{Boundary, GeoPoint, Polygon};

    fn settings() -> ImportSettings {
        ImportSettings {
            lookup_chunk_size: 2,
            write_batch_size: 2,
            ..ImportSettings::default()
        }
    }

    fn region() -> Region {
        Region {
            id: 1,
            name: "Test".to_string(),
            boundary: Boundary::new(vec![Polygon::rectangle(
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(10.0, 10.0),
            )]),
        }
    }

    fn row(row_index: usize, lat: f64, lon: f64) -> ImportRow {
        let mut facility = FacilityAttributes::new(GeoPoint::new(lat, lon));
        facility.name = Some(format!("School {}", row_index));
        ImportRow::new(row_index, facility, SnapshotAttributes::default())
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_lowercases() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());

        let mut rows = vec![row(2, 1.0, 1.0), row(3, 2.0, 2.0), row(4, 3.0, 3.0)];
        rows[0].facility.external_id = Some("abc-1".to_string());

        assert_eq!(coordinator.create(1, &mut rows).await.unwrap(), 3);
        assert!(rows.iter().all(|r| r.facility_id.is_some()));

        let stored = store.facilities().await;
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].name_lower, "school 2");
        assert_eq!(stored[0].external_id, "abc-1");
    }

    #[tokio::test]
    async fn test_update_keeps_unsupplied_fields() {
        let mut existing = FacilityRecord::new(1, GeoPoint::new(1.0, 1.0));
        existing.address = "Main road".to_string();
        existing.name = "Old".to_string();
        existing.name_lower = "old".to_string();
        let store = Arc::new(MemoryRegistryStore::with_facilities(vec![existing.clone()]));
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());

        let mut rows = vec![row(2, 1.5, 1.5)];
        rows[0].existing = Some(existing.clone());

        assert_eq!(coordinator.update(&mut rows).await.unwrap(), 1);
        assert_eq!(rows[0].facility_id, Some(existing.id));

        let stored = &store.facilities().await[0];
        assert_eq!(stored.name, "School 2");
        assert_eq!(stored.name_lower, "school 2");
        assert_eq!(stored.point, GeoPoint::new(1.5, 1.5));
        assert_eq!(stored.address, "Main road");
    }

    #[tokio::test]
    async fn test_boundary_cleanup_reports_dropped_rows() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());

        let mut rows = vec![row(2, 1.0, 1.0), row(3, 20.0, 20.0), row(4, 5.0, 5.0)];
        coordinator.create(1, &mut rows).await.unwrap();

        let (kept, errors) = coordinator.remove_outside_boundary(&region(), rows).await.unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            format!("Row 3: {}", OUTSIDE_BOUNDARY_MESSAGE)
        );
        assert_eq!(store.facilities().await.len(), 2);
    }

    #[tokio::test]
    async fn test_history_carries_forward_prior_values() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());
        let last_week = ImportPeriod::new(2024, 9).unwrap();
        let this_week = ImportPeriod::new(2024, 10).unwrap();

        let mut rows = vec![row(2, 1.0, 1.0)];
        coordinator.create(1, &mut rows).await.unwrap();
        rows[0].snapshot.num_students = Some(40);
        coordinator.materialize_history(&rows, last_week).await.unwrap();

        rows[0].snapshot = SnapshotAttributes {
            num_teachers: Some(3),
            ..SnapshotAttributes::default()
        };
        assert_eq!(coordinator.materialize_history(&rows, this_week).await.unwrap(), 1);

        let snapshots = store.snapshots().await;
        let current = snapshots.iter().find(|s| s.period == this_week).unwrap();
        assert_eq!(current.num_students, 40);
        assert_eq!(current.num_teachers, 3);
        assert_eq!(current.date, this_week.monday());

        let facility = &store.facilities().await[0];
        assert_eq!(facility.latest_snapshot_id, Some(current.id));
    }

    #[tokio::test]
    async fn test_backfilled_period_keeps_newest_pointer() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());
        let newer = ImportPeriod::new(2024, 10).unwrap();
        let older = ImportPeriod::new(2024, 9).unwrap();

        let mut rows = vec![row(2, 1.0, 1.0)];
        coordinator.create(1, &mut rows).await.unwrap();
        coordinator.materialize_history(&rows, newer).await.unwrap();
        coordinator.materialize_history(&rows, older).await.unwrap();

        let snapshots = store.snapshots().await;
        assert_eq!(snapshots.len(), 2);
        let newest = snapshots.iter().find(|s| s.period == newer).unwrap();
        assert_eq!(store.facilities().await[0].latest_snapshot_id, Some(newest.id));
    }

    #[tokio::test]
    async fn test_same_period_reimport_replaces_snapshot() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());
        let period = ImportPeriod::new(2024, 10).unwrap();

        let mut rows = vec![row(2, 1.0, 1.0)];
        coordinator.create(1, &mut rows).await.unwrap();
        rows[0].snapshot.num_students = Some(10);
        coordinator.materialize_history(&rows, period).await.unwrap();
        rows[0].snapshot.num_students = Some(12);
        coordinator.materialize_history(&rows, period).await.unwrap();

        let snapshots = store.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].num_students, 12);
    }

    #[tokio::test]
    async fn test_last_row_wins_for_shared_facility() {
        let store = Arc::new(MemoryRegistryStore::new());
        let coordinator = PersistenceCoordinator::new(store.clone(), &settings());
        let period = ImportPeriod::new(2024, 10).unwrap();

        let mut rows = vec![row(2, 1.0, 1.0)];
        coordinator.create(1, &mut rows).await.unwrap();
        let mut second = rows[0].clone();
        second.row_index = 3;
        rows[0].snapshot.num_students = Some(1);
        second.snapshot.num_students = Some(2);
        rows.push(second);

        assert_eq!(coordinator.materialize_history(&rows, period).await.unwrap(), 1);
        assert_eq!(store.snapshots().await[0].num_students, 2);
    }
}
