//! Tests for database initialization

use registry_common::db::init::init_database;
use registry_common::db::{load_region, save_region, Region};
use registry_common::{Boundary, GeoPoint, Polygon};
use sqlx::Row;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("registry.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");

    let pool = init_database(&db_path).await.unwrap();
    save_region(
        &pool,
        &Region {
            id: 1,
            name: "Coast".to_string(),
            boundary: Boundary::new(vec![Polygon::rectangle(
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(1.0, 1.0),
            )]),
        },
    )
    .await
    .unwrap();
    pool.close().await;

    // Second open keeps the data and re-runs schema creation harmlessly
    let pool = init_database(&db_path).await.unwrap();
    let region = load_region(&pool, 1).await.unwrap();
    assert_eq!(region.name, "Coast");
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("registry.db")).await.unwrap();

    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&pool)
        .await
        .unwrap();
    let tables: Vec<String> = rows.iter().map(|r| r.get("name")).collect();

    for expected in ["regions", "facilities", "facility_snapshots", "import_sessions"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_foreign_keys_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("registry.db")).await.unwrap();

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(enabled, 1);

    // Facility in a region that does not exist
    let result = sqlx::query("INSERT INTO facilities (id, region_id, lat, lon) VALUES ('x', 42, 0.1, 0.1)")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
