//! End-to-end import workflow tests against an on-disk SQLite database

mod helpers;

use helpers::{
    create_test_db, create_test_orchestrator, facility_count, raw_row, seed_region, snapshots_for,
    test_period,
};
use registry_common::db::Region;
use registry_import::db::sessions::{load_session, save_session};
use registry_import::models::{ImportSession, ImportState};
use registry_import::services::CacheInvalidator;
use registry_import::RawRow;
use sqlx::{Row, SqlitePool};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn school(id: &str, name: &str, lat: &str, lon: &str) -> RawRow {
    raw_row(&[
        ("school_id", id),
        ("name", name),
        ("lat", lat),
        ("lon", lon),
        ("educ_level", "Primary"),
        ("num_students", "120"),
    ])
}

async fn facility_id(pool: &SqlitePool, external_id: &str) -> Uuid {
    let id: String = sqlx::query_scalar("SELECT id FROM facilities WHERE external_id = ?")
        .bind(external_id)
        .fetch_one(pool)
        .await
        .unwrap();
    Uuid::parse_str(&id).unwrap()
}

async fn setup() -> (tempfile::TempDir, SqlitePool, Region) {
    let (dir, pool) = create_test_db().await.unwrap();
    let region = seed_region(&pool).await.unwrap();
    (dir, pool, region)
}

#[derive(Default)]
struct RecordingCache {
    invalidated: Mutex<Vec<i64>>,
}

impl CacheInvalidator for RecordingCache {
    fn invalidate(&self, region_id: i64) {
        self.invalidated.lock().unwrap().push(region_id);
    }
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());
    let rows = || {
        vec![
            school("S-1", "Alpha", "1.0", "1.0"),
            school("S-2", "Beta", "2.0", "2.0"),
            school("S-3", "Gamma", "3.0", "3.0"),
            school("S-4", "Delta", "4.0", "4.0"),
        ]
    };

    let first = orchestrator
        .run_import_for_period(&region, rows(), true, test_period())
        .await
        .unwrap();
    let second = orchestrator
        .run_import_for_period(&region, rows(), true, test_period())
        .await
        .unwrap();

    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert_eq!(first.processed_count, 4);
    assert_eq!(second.processed_count, 4);
    assert_eq!(facility_count(&pool).await.unwrap(), 4);

    let id = facility_id(&pool, "s-2").await;
    let snapshots = snapshots_for(&pool, id).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].2, 120);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM facility_snapshots")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_external_id_differing_by_case_is_duplicate() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                school("ABC", "First", "1.0", "1.0"),
                school("abc", "Second", "5.0", "5.0"),
            ],
            false,
            test_period(),
        )
        .await
        .unwrap();

    assert!(outcome.errors.is_empty());
    assert_eq!(
        outcome.warnings,
        vec!["Row 3: Bad data provided for school identifier: duplicate entry".to_string()]
    );
    assert_eq!(outcome.processed_count, 1);
    assert_eq!(facility_count(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_zero_point_always_errors() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![school("Z-1", "Zero", "0", "0.0")],
            true,
            test_period(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.errors,
        vec!["Row 2: Bad data provided for geopoint: zero point".to_string()]
    );
    assert_eq!(outcome.processed_count, 0);
    assert_eq!(facility_count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_point_outside_boundary_is_removed() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                school("IN-1", "Inside", "1.0", "1.0"),
                school("OUT-1", "Outside", "20.0", "20.0"),
            ],
            true,
            test_period(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.errors,
        vec!["Row 3: Bad data provided for geopoint: point outside region boundary".to_string()]
    );
    assert_eq!(outcome.processed_count, 1);
    assert_eq!(facility_count(&pool).await.unwrap(), 1);

    let outside: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM facilities WHERE external_id = 'out-1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(outside, 0);
}

#[tokio::test]
async fn test_too_close_pair_keeps_one() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                school("C-1", "Close one", "5.0", "5.0"),
                school("C-2", "Close two", "5.001", "5.0"),
            ],
            true,
            test_period(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.errors,
        vec!["Row 3: Geopoint is closer than 500m to another with same education level.".to_string()]
    );
    assert_eq!(facility_count(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_errors_halt_before_any_write() {
    let (_dir, pool, region) = setup().await;
    let cache = Arc::new(RecordingCache::default());
    let orchestrator = create_test_orchestrator(pool.clone()).with_cache_invalidator(cache.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                school("C-1", "Close one", "5.0", "5.0"),
                school("C-2", "Close two", "5.001", "5.0"),
            ],
            false,
            test_period(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.processed_count, 0);
    assert_eq!(facility_count(&pool).await.unwrap(), 0);
    assert!(cache.invalidated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_validation_errors_halt() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let mut session = ImportSession::new(region.id, test_period(), false);
    orchestrator
        .execute(
            &mut session,
            &region,
            vec![
                school("V-1", "Valid", "1.0", "1.0"),
                raw_row(&[("name", "No location")]),
            ],
        )
        .await
        .unwrap();

    assert_eq!(session.state, ImportState::Done);
    assert_eq!(session.errors.len(), 1);
    assert_eq!(session.processed_count, 0);
    assert_eq!(facility_count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_misspelled_headers_report_missing_coordinates() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                raw_row(&[("latitude", "1.0"), ("longitude", "1.0")]),
                raw_row(&[("latitude", "2.0"), ("longitude", "2.0")]),
                raw_row(&[("latitude", ""), ("longitude", "na")]),
            ],
            false,
            test_period(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.errors,
        vec![
            "Row 2: Missing data for required column(s) lat, lon",
            "Row 3: Missing data for required column(s) lat, lon",
        ]
    );
    assert_eq!(outcome.processed_count, 0);
    assert_eq!(facility_count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_speed_in_unit_confusion_range_is_half_mbps() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let mut row = school("SP-1", "Speedy", "1.0", "1.0");
    row.insert("speed_connectivity".to_string(), "550".to_string());
    orchestrator
        .run_import_for_period(&region, vec![row], false, test_period())
        .await
        .unwrap();

    let stored = sqlx::query("SELECT connectivity, connectivity_speed FROM facility_snapshots")
        .fetch_one(&pool)
        .await
        .unwrap();
    let speed: f64 = stored.get("connectivity_speed");
    let connectivity: bool = stored.get("connectivity");
    assert_eq!(speed, 500_000.0);
    assert!(connectivity);
}

#[tokio::test]
async fn test_prior_snapshot_values_carry_forward() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());
    let this_week = test_period();
    let last_week = this_week.previous();

    orchestrator
        .run_import_for_period(
            &region,
            vec![raw_row(&[
                ("school_id", "H-1"),
                ("lat", "1.0"),
                ("lon", "1.0"),
                ("num_students", "40"),
            ])],
            false,
            last_week,
        )
        .await
        .unwrap();
    orchestrator
        .run_import_for_period(
            &region,
            vec![raw_row(&[
                ("school_id", "H-1"),
                ("lat", "1.0"),
                ("lon", "1.0"),
                ("num_teachers", "7"),
            ])],
            false,
            this_week,
        )
        .await
        .unwrap();

    let id = facility_id(&pool, "h-1").await;
    let current = sqlx::query(
        "SELECT id, num_students, num_teachers FROM facility_snapshots WHERE facility_id = ? AND year = ? AND week = ?",
    )
    .bind(id.to_string())
    .bind(this_week.year)
    .bind(this_week.week as i64)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(current.get::<i64, _>("num_students"), 40);
    assert_eq!(current.get::<i64, _>("num_teachers"), 7);

    let latest: Option<String> = sqlx::query_scalar("SELECT latest_snapshot_id FROM facilities WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(latest, Some(current.get::<String, _>("id")));
    assert_eq!(snapshots_for(&pool, id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_backfilling_an_earlier_week_keeps_latest_pointer() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());
    let this_week = test_period();

    for period in [this_week, this_week.previous()] {
        orchestrator
            .run_import_for_period(
                &region,
                vec![school("B-1", "Backfill", "1.0", "1.0")],
                false,
                period,
            )
            .await
            .unwrap();
    }

    let id = facility_id(&pool, "b-1").await;
    let snapshots = snapshots_for(&pool, id).await.unwrap();
    assert_eq!(snapshots.len(), 2);
    let (newest_id, newest_week, _) = snapshots[1];
    assert_eq!(newest_week, i64::from(this_week.week));

    let latest: Option<String> = sqlx::query_scalar("SELECT latest_snapshot_id FROM facilities WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(latest, Some(newest_id.to_string()));
}

#[tokio::test]
async fn test_processed_count_after_every_filter() {
    let (_dir, pool, region) = setup().await;
    let cache = Arc::new(RecordingCache::default());
    let orchestrator = create_test_orchestrator(pool.clone()).with_cache_invalidator(cache.clone());

    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![
                school("P-1", "Kept one", "1.0", "1.0"),
                school("P-2", "Bad lat", "north", "1.0"),
                school("P-3", "Kept one", "3.0", "3.0"),
                school("P-4", "Too close", "1.001", "1.0"),
                school("P-5", "Outside", "-5.0", "-5.0"),
                school("P-6", "Kept two", "6.0", "6.0"),
                raw_row(&[("unrelated", ""), ("name", "na")]),
            ],
            true,
            test_period(),
        )
        .await
        .unwrap();

    // validation, too close, outside boundary
    assert_eq!(outcome.errors.len(), 3, "{:?}", outcome.errors);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.processed_count, 2);
    assert_eq!(facility_count(&pool).await.unwrap(), 2);
    assert_eq!(*cache.invalidated.lock().unwrap(), vec![region.id]);

    let report = outcome.report();
    assert!(report.starts_with("Row 3: Bad data provided for geopoint"));
    assert!(report.contains("\nWarnings:\nRow 4: Bad data provided for school name: duplicate entry"));
}

#[tokio::test]
async fn test_existing_facility_updated_by_name() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    orchestrator
        .run_import_for_period(
            &region,
            vec![raw_row(&[("name", "Escuela Central"), ("lat", "2.0"), ("lon", "2.0")])],
            false,
            test_period(),
        )
        .await
        .unwrap();
    let outcome = orchestrator
        .run_import_for_period(
            &region,
            vec![raw_row(&[
                ("name", "ESCUELA CENTRAL"),
                ("lat", "2.0001"),
                ("lon", "2.0"),
                ("address", "Calle 1"),
            ])],
            false,
            test_period(),
        )
        .await
        .unwrap();

    assert!(outcome.errors.is_empty());
    assert_eq!(facility_count(&pool).await.unwrap(), 1);
    let stored = sqlx::query("SELECT name, name_lower, address, lat FROM facilities")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored.get::<String, _>("name"), "ESCUELA CENTRAL");
    assert_eq!(stored.get::<String, _>("name_lower"), "escuela central");
    assert_eq!(stored.get::<String, _>("address"), "Calle 1");
    assert_eq!(stored.get::<f64, _>("lat"), 2.0001);
}

#[tokio::test]
async fn test_session_persisted_after_run() {
    let (_dir, pool, region) = setup().await;
    let orchestrator = create_test_orchestrator(pool.clone());

    let mut session = ImportSession::new(region.id, test_period(), true);
    orchestrator
        .execute(
            &mut session,
            &region,
            vec![
                school("A-1", "Alpha", "1.0", "1.0"),
                school("A-1", "Alpha again", "2.0", "2.0"),
            ],
        )
        .await
        .unwrap();
    save_session(&pool, &session).await.unwrap();

    let loaded = load_session(&pool, session.session_id).await.unwrap().unwrap();
    assert_eq!(loaded.state, ImportState::Done);
    assert_eq!(loaded.processed_count, 1);
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.ended_at.is_some());
}
