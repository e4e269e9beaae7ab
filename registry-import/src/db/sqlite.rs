//! SQLite registry store
//!
//! Bulk inserts are multi-row `INSERT ... VALUES` statements built with
//! `QueryBuilder`, one per call, inside a transaction. Callers keep each call
//! under the write batch size so the statement stays below SQLite's bound
//! parameter limit.

use async_trait::async_trait;
use chrono::NaiveDate;
use registry_common::db::{
    ConnectivityStatus, FacilityField, FacilityPoint, FacilityRecord, Region, SnapshotRecord,
};
use registry_common::time::ImportPeriod;
use registry_common::GeoPoint;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use super::RegistryStore;
use crate::error::{ImportError, ImportResult};

const FACILITY_COLUMNS: &str = "id, region_id, external_id, name, name_lower, lat, lon, \
     admin_1_name, admin_2_name, admin_3_name, admin_4_name, \
     education_level, environment, school_type, address, latest_snapshot_id";

const SNAPSHOT_COLUMNS: &str = "id, facility_id, year, week, date, \
     num_students, num_teachers, num_classroom, num_latrines, \
     running_water, electricity_availability, computer_lab, num_computers, \
     connectivity, connectivity_status, connectivity_type, connectivity_speed, \
     connectivity_latency, coverage_availability, coverage_type";

/// Default number of ids per `IN (...)` list for internally chunked deletes
const DEFAULT_DELETE_CHUNK_SIZE: usize = 500;

/// Registry store over the shared SQLite database
#[derive(Clone)]
pub struct SqliteRegistryStore {
    pool: SqlitePool,
    delete_chunk_size: usize,
}

impl SqliteRegistryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            delete_chunk_size: DEFAULT_DELETE_CHUNK_SIZE,
        }
    }

    /// Chunk size for the boundary sweep's `DELETE ... WHERE id IN (...)`
    pub fn with_delete_chunk_size(mut self, chunk_size: usize) -> Self {
        self.delete_chunk_size = chunk_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_uuid(value: &str, column: &str) -> ImportResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| ImportError::Corrupt(format!("Invalid {} '{}': {}", column, value, e)))
}

fn to_u32(value: i64, column: &str) -> ImportResult<u32> {
    u32::try_from(value)
        .map_err(|_| ImportError::Corrupt(format!("{} out of range: {}", column, value)))
}

fn facility_from_row(row: &SqliteRow) -> ImportResult<FacilityRecord> {
    let id: String = row.get("id");
    let latest_snapshot_id: Option<String> = row.get("latest_snapshot_id");

    Ok(FacilityRecord {
        id: parse_uuid(&id, "facility id")?,
        region_id: row.get("region_id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        name_lower: row.get("name_lower"),
        point: GeoPoint::new(row.get("lat"), row.get("lon")),
        admin_1_name: row.get("admin_1_name"),
        admin_2_name: row.get("admin_2_name"),
        admin_3_name: row.get("admin_3_name"),
        admin_4_name: row.get("admin_4_name"),
        education_level: row.get("education_level"),
        environment: row.get("environment"),
        school_type: row.get("school_type"),
        address: row.get("address"),
        latest_snapshot_id: latest_snapshot_id
            .map(|s| parse_uuid(&s, "latest_snapshot_id"))
            .transpose()?,
    })
}

fn snapshot_from_row(row: &SqliteRow) -> ImportResult<SnapshotRecord> {
    let id: String = row.get("id");
    let facility_id: String = row.get("facility_id");
    let year: i64 = row.get("year");
    let week: i64 = row.get("week");
    let date: String = row.get("date");
    let status: String = row.get("connectivity_status");

    let year = i32::try_from(year)
        .map_err(|_| ImportError::Corrupt(format!("year out of range: {}", year)))?;

    Ok(SnapshotRecord {
        id: parse_uuid(&id, "snapshot id")?,
        facility_id: parse_uuid(&facility_id, "facility_id")?,
        period: ImportPeriod::new(year, to_u32(week, "week")?)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| ImportError::Corrupt(format!("Invalid snapshot date '{}': {}", date, e)))?,
        num_students: to_u32(row.get("num_students"), "num_students")?,
        num_teachers: to_u32(row.get("num_teachers"), "num_teachers")?,
        num_classroom: to_u32(row.get("num_classroom"), "num_classroom")?,
        num_latrines: to_u32(row.get("num_latrines"), "num_latrines")?,
        running_water: row.get("running_water"),
        electricity_availability: row.get("electricity_availability"),
        computer_lab: row.get("computer_lab"),
        num_computers: to_u32(row.get("num_computers"), "num_computers")?,
        connectivity: row.get("connectivity"),
        connectivity_status: ConnectivityStatus::parse(&status).ok_or_else(|| {
            ImportError::Corrupt(format!("Unknown connectivity_status '{}'", status))
        })?,
        connectivity_type: row.get("connectivity_type"),
        connectivity_speed: row.get("connectivity_speed"),
        connectivity_latency: to_u32(row.get("connectivity_latency"), "connectivity_latency")?,
        coverage_availability: row.get("coverage_availability"),
        coverage_type: row.get("coverage_type"),
    })
}

/// Append ` IN (?, ?, ...)` binding each id as text
fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    query.push(" IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn find_by_external_ids(
        &self,
        region_id: i64,
        external_ids: &[String],
    ) -> ImportResult<Vec<FacilityRecord>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM facilities WHERE region_id = ",
            FACILITY_COLUMNS
        ));
        query.push_bind(region_id);
        query.push(" AND external_id IN (");
        let mut separated = query.separated(", ");
        for external_id in external_ids {
            separated.push_bind(external_id.to_lowercase());
        }
        separated.push_unseparated(") ORDER BY created_at, id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(facility_from_row).collect()
    }

    async fn find_by_names(&self, region_id: i64, names: &[String]) -> ImportResult<Vec<FacilityRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM facilities WHERE region_id = ",
            FACILITY_COLUMNS
        ));
        query.push_bind(region_id);
        query.push(" AND name_lower IN (");
        let mut separated = query.separated(", ");
        for name in names {
            separated.push_bind(name.to_lowercase());
        }
        separated.push_unseparated(") ORDER BY created_at, id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(facility_from_row).collect()
    }

    async fn facility_points(&self, region_id: i64) -> ImportResult<Vec<FacilityPoint>> {
        let rows = sqlx::query("SELECT id, education_level, lat, lon FROM facilities WHERE region_id = ?")
            .bind(region_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                Ok(FacilityPoint {
                    id: parse_uuid(&id, "facility id")?,
                    education_level: row.get("education_level"),
                    point: GeoPoint::new(row.get("lat"), row.get("lon")),
                })
            })
            .collect()
    }

    async fn create_facilities(&self, facilities: &[FacilityRecord]) -> ImportResult<()> {
        if facilities.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut query = QueryBuilder::<Sqlite>::new(format!("INSERT INTO facilities ({}) ", FACILITY_COLUMNS));
        query.push_values(facilities, |mut b, f| {
            b.push_bind(f.id.to_string())
                .push_bind(f.region_id)
                .push_bind(f.external_id.clone())
                .push_bind(f.name.clone())
                .push_bind(f.name_lower.clone())
                .push_bind(f.point.lat)
                .push_bind(f.point.lon)
                .push_bind(f.admin_1_name.clone())
                .push_bind(f.admin_2_name.clone())
                .push_bind(f.admin_3_name.clone())
                .push_bind(f.admin_4_name.clone())
                .push_bind(f.education_level.clone())
                .push_bind(f.environment.clone())
                .push_bind(f.school_type.clone())
                .push_bind(f.address.clone())
                .push_bind(f.latest_snapshot_id.map(|id| id.to_string()));
        });
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(count = facilities.len(), "Inserted facilities");
        Ok(())
    }

    async fn update_facilities(
        &self,
        fields: &[FacilityField],
        facilities: &[FacilityRecord],
    ) -> ImportResult<()> {
        if fields.is_empty() || facilities.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = fields
            .iter()
            .flat_map(|f| f.columns().iter())
            .map(|column| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE facilities SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            assignments.join(", ")
        );

        let mut tx = self.pool.begin().await?;
        for facility in facilities {
            let mut query = sqlx::query(&sql);
            // Bind order follows FacilityField::columns()
            for field in fields {
                query = match field {
                    FacilityField::ExternalId => query.bind(facility.external_id.as_str()),
                    FacilityField::Name => query
                        .bind(facility.name.as_str())
                        .bind(facility.name_lower.as_str()),
                    FacilityField::Point => query.bind(facility.point.lat).bind(facility.point.lon),
                    FacilityField::Admin1Name => query.bind(facility.admin_1_name.as_str()),
                    FacilityField::Admin2Name => query.bind(facility.admin_2_name.as_str()),
                    FacilityField::Admin3Name => query.bind(facility.admin_3_name.as_str()),
                    FacilityField::Admin4Name => query.bind(facility.admin_4_name.as_str()),
                    FacilityField::EducationLevel => query.bind(facility.education_level.as_str()),
                    FacilityField::Environment => query.bind(facility.environment.as_str()),
                    FacilityField::SchoolType => query.bind(facility.school_type.as_str()),
                    FacilityField::Address => query.bind(facility.address.as_str()),
                };
            }
            query.bind(facility.id.to_string()).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(count = facilities.len(), ?fields, "Updated facilities");
        Ok(())
    }

    async fn delete_outside_boundary(&self, region: &Region) -> ImportResult<u64> {
        // No spatial predicates in SQLite: test containment here, delete by id set
        let rows = sqlx::query("SELECT id, lat, lon FROM facilities WHERE region_id = ?")
            .bind(region.id)
            .fetch_all(&self.pool)
            .await?;

        let mut outside = Vec::new();
        for row in &rows {
            let point = GeoPoint::new(row.get("lat"), row.get("lon"));
            if !region.boundary.contains(&point) {
                let id: String = row.get("id");
                outside.push(parse_uuid(&id, "facility id")?);
            }
        }
        if outside.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        let mut tx = self.pool.begin().await?;
        for chunk in outside.chunks(self.delete_chunk_size) {
            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM facilities WHERE id");
            push_id_list(&mut query, chunk);
            deleted += query.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }

    async fn existing_facility_ids(&self, ids: &[Uuid]) -> ImportResult<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM facilities WHERE id");
        push_id_list(&mut query, ids);
        let rows = query.build().fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                parse_uuid(&id, "facility id")
            })
            .collect()
    }

    async fn latest_snapshots_before(
        &self,
        facility_ids: &[Uuid],
        period: ImportPeriod,
    ) -> ImportResult<HashMap<Uuid, SnapshotRecord>> {
        if facility_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM facility_snapshots WHERE (year < ",
            SNAPSHOT_COLUMNS
        ));
        query.push_bind(period.year);
        query.push(" OR (year = ");
        query.push_bind(period.year);
        query.push(" AND week < ");
        query.push_bind(i64::from(period.week));
        query.push(")) AND facility_id");
        push_id_list(&mut query, facility_ids);
        query.push(" ORDER BY facility_id, year DESC, week DESC");

        let rows = query.build().fetch_all(&self.pool).await?;

        let mut latest = HashMap::new();
        for row in &rows {
            let snapshot = snapshot_from_row(row)?;
            // Rows arrive newest first per facility
            latest.entry(snapshot.facility_id).or_insert(snapshot);
        }
        Ok(latest)
    }

    async fn delete_snapshots(&self, facility_ids: &[Uuid], period: ImportPeriod) -> ImportResult<u64> {
        if facility_ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM facility_snapshots WHERE year = ");
        query.push_bind(period.year);
        query.push(" AND week = ");
        query.push_bind(i64::from(period.week));
        query.push(" AND facility_id");
        push_id_list(&mut query, facility_ids);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn create_snapshots(&self, snapshots: &[SnapshotRecord]) -> ImportResult<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("INSERT INTO facility_snapshots ({}) ", SNAPSHOT_COLUMNS));
        query.push_values(snapshots, |mut b, s| {
            b.push_bind(s.id.to_string())
                .push_bind(s.facility_id.to_string())
                .push_bind(s.period.year)
                .push_bind(i64::from(s.period.week))
                .push_bind(s.date.to_string())
                .push_bind(i64::from(s.num_students))
                .push_bind(i64::from(s.num_teachers))
                .push_bind(i64::from(s.num_classroom))
                .push_bind(i64::from(s.num_latrines))
                .push_bind(s.running_water)
                .push_bind(s.electricity_availability)
                .push_bind(s.computer_lab)
                .push_bind(i64::from(s.num_computers))
                .push_bind(s.connectivity)
                .push_bind(s.connectivity_status.as_str())
                .push_bind(s.connectivity_type.clone())
                .push_bind(s.connectivity_speed)
                .push_bind(i64::from(s.connectivity_latency))
                .push_bind(s.coverage_availability)
                .push_bind(s.coverage_type.clone());
        });
        query.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(count = snapshots.len(), "Inserted snapshots");
        Ok(())
    }

    async fn set_latest_snapshots(&self, pointers: &[(Uuid, Uuid)]) -> ImportResult<()> {
        if pointers.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (facility_id, snapshot_id) in pointers {
            sqlx::query(
                r#"
                UPDATE facilities SET latest_snapshot_id = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND NOT EXISTS (
                    SELECT 1 FROM facility_snapshots AS newer
                    JOIN facility_snapshots AS target ON target.id = ?
                    WHERE newer.facility_id = facilities.id
                      AND (newer.year > target.year
                           OR (newer.year = target.year AND newer.week > target.week))
                )
                "#,
            )
            .bind(snapshot_id.to_string())
            .bind(facility_id.to_string())
            .bind(snapshot_id.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
