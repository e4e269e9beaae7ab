//! Database Test Utilities
//!
//! On-disk SQLite databases, seeded regions and raw upload rows

#![allow(dead_code)]

use anyhow::Result;
use registry_common::config::ImportSettings;
use registry_common::db::{init_database, save_region, Region};
use registry_common::events::EventBus;
use registry_common::time::ImportPeriod;
use registry_common::{Boundary, GeoPoint, Polygon};
use registry_import::db::SqliteRegistryStore;
use registry_import::{RawRow, WorkflowOrchestrator};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_registry.db");
    let pool = init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Region 1 covering lat/lon 0..10
pub async fn seed_region(pool: &SqlitePool) -> Result<Region> {
    let region = Region {
        id: 1,
        name: "Test Region".to_string(),
        boundary: Boundary::new(vec![Polygon::rectangle(
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(10.0, 10.0),
        )]),
    };
    save_region(pool, &region).await?;
    Ok(region)
}

/// Small chunks so batching paths are exercised
pub fn test_settings() -> ImportSettings {
    ImportSettings {
        lookup_chunk_size: 2,
        write_batch_size: 3,
        ..ImportSettings::default()
    }
}

pub fn test_period() -> ImportPeriod {
    ImportPeriod::new(2024, 10).expect("valid period")
}

/// Create test WorkflowOrchestrator over the SQLite store
pub fn create_test_orchestrator(pool: SqlitePool) -> WorkflowOrchestrator {
    let store = Arc::new(SqliteRegistryStore::new(pool).with_delete_chunk_size(2));
    WorkflowOrchestrator::new(store, EventBus::new(100), test_settings())
}

/// Raw upload row from header/value pairs
pub fn raw_row(cells: &[(&str, &str)]) -> RawRow {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub async fn facility_count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM facilities")
        .fetch_one(pool)
        .await?)
}

/// Snapshot ids and student counts of one facility, oldest period first
pub async fn snapshots_for(pool: &SqlitePool, facility_id: Uuid) -> Result<Vec<(Uuid, i64, i64)>> {
    let rows = sqlx::query(
        "SELECT id, week, num_students FROM facility_snapshots WHERE facility_id = ? ORDER BY year, week",
    )
    .bind(facility_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<(Uuid, i64, i64)> {
            let id: String = row.get("id");
            Ok((Uuid::parse_str(&id)?, row.get("week"), row.get("num_students")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_db() {
        let (_temp_dir, pool) = create_test_db().await.unwrap();
        assert_eq!(facility_count(&pool).await.unwrap(), 0);
    }
}
