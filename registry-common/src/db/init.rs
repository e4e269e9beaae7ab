//! Database initialization
//!
//! Opens (creating if needed) the registry database and brings the schema up
//! to date. Every statement is `CREATE ... IF NOT EXISTS`, so this is safe to
//! run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Foreign keys are a per-connection setting
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// One connection only: every `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_tables(&pool).await?;
    Ok(pool)
}

/// Create all registry tables and indexes (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_regions_table(pool).await?;
    create_facilities_table(pool).await?;
    create_facility_snapshots_table(pool).await?;
    create_import_sessions_table(pool).await?;
    Ok(())
}

async fn create_regions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            boundary TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_facilities_table(pool: &SqlitePool) -> Result<()> {
    // latest_snapshot_id is a forward reference; SQLite resolves it at DML time
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS facilities (
            id TEXT PRIMARY KEY,
            region_id INTEGER NOT NULL REFERENCES regions(id) ON DELETE CASCADE,
            external_id TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            name_lower TEXT NOT NULL DEFAULT '',
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            admin_1_name TEXT NOT NULL DEFAULT '',
            admin_2_name TEXT NOT NULL DEFAULT '',
            admin_3_name TEXT NOT NULL DEFAULT '',
            admin_4_name TEXT NOT NULL DEFAULT '',
            education_level TEXT NOT NULL DEFAULT '',
            environment TEXT NOT NULL DEFAULT '',
            school_type TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            latest_snapshot_id TEXT REFERENCES facility_snapshots(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_facilities_region_external_id ON facilities(region_id, external_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_facilities_region_name_lower ON facilities(region_id, name_lower)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_facility_snapshots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS facility_snapshots (
            id TEXT PRIMARY KEY,
            facility_id TEXT NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
            year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            date TEXT NOT NULL,
            num_students INTEGER NOT NULL DEFAULT 0,
            num_teachers INTEGER NOT NULL DEFAULT 0,
            num_classroom INTEGER NOT NULL DEFAULT 0,
            num_latrines INTEGER NOT NULL DEFAULT 0,
            running_water INTEGER NOT NULL DEFAULT 0,
            electricity_availability INTEGER NOT NULL DEFAULT 0,
            computer_lab INTEGER NOT NULL DEFAULT 0,
            num_computers INTEGER NOT NULL DEFAULT 0,
            connectivity INTEGER NOT NULL DEFAULT 0,
            connectivity_status TEXT NOT NULL DEFAULT 'no',
            connectivity_type TEXT NOT NULL DEFAULT 'unknown',
            connectivity_speed REAL NOT NULL DEFAULT 0,
            connectivity_latency INTEGER NOT NULL DEFAULT 0,
            coverage_availability INTEGER NOT NULL DEFAULT 0,
            coverage_type TEXT NOT NULL DEFAULT 'unknown',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(facility_id, year, week)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_facility_snapshots_period ON facility_snapshots(year, week)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_sessions (
            session_id TEXT PRIMARY KEY,
            region_id INTEGER NOT NULL,
            period TEXT NOT NULL,
            state TEXT NOT NULL,
            ignore_errors INTEGER NOT NULL DEFAULT 0,
            processed_count INTEGER NOT NULL DEFAULT 0,
            warnings TEXT NOT NULL,
            errors TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
