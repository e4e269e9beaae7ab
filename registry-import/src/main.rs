//! registry-import - Facility bulk import
//!
//! Reads a CSV upload, runs it through the import pipeline for one region
//! and prints the report (errors, then warnings).
//!
//! **Usage:**
//! ```bash
//! registry-import --region <id> --file <rows.csv> [--config <toml>]
//!     [--database <path>] [--ignore-errors] [--period YYYY-Www]
//! ```
//!
//! Exits non-zero when the import reported errors.

use anyhow::{Context, Result};
use clap::Parser;
use registry_common::config::ImportConfig;
use registry_common::events::EventBus;
use registry_common::time::ImportPeriod;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use registry_import::db::sessions::save_session;
use registry_import::db::SqliteRegistryStore;
use registry_import::models::ImportSession;
use registry_import::reader::read_rows_from_path;
use registry_import::WorkflowOrchestrator;

/// Facility registry bulk import
#[derive(Parser, Debug)]
#[command(name = "registry-import")]
#[command(about = "Import facility rows into a region's registry")]
struct Args {
    /// Region receiving the facilities
    #[arg(long)]
    region: i64,

    /// CSV file with a header row
    #[arg(long, value_name = "FILE")]
    file: PathBuf,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides REGISTRY_DATABASE)
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Persist surviving rows even when some rows have errors
    #[arg(long)]
    ignore_errors: bool,

    /// ISO week to write snapshots for (defaults to the current week)
    #[arg(long, value_name = "YYYY-Www")]
    period: Option<ImportPeriod>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ImportConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let default_filter = format!("registry_import={0},registry_common={0}", config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting registry-import v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.resolve_database_path(args.database.as_deref());
    let ignore_errors = config.resolve_ignore_errors(args.ignore_errors);
    let period = args.period.unwrap_or_else(ImportPeriod::current);
    info!("Database: {}", db_path.display());

    let pool = registry_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let region = registry_common::db::load_region(&pool, args.region)
        .await
        .with_context(|| format!("Failed to load region {}", args.region))?;

    let rows = read_rows_from_path(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    info!(region_id = region.id, rows = rows.len(), period = %period, "Loaded upload");

    let store = Arc::new(SqliteRegistryStore::new(pool.clone()));
    let orchestrator = WorkflowOrchestrator::new(store, EventBus::new(100), config.import.clone());

    let mut session = ImportSession::new(region.id, period, ignore_errors);
    let result = orchestrator.execute(&mut session, &region, rows).await;

    save_session(&pool, &session)
        .await
        .context("Failed to save import session")?;
    result.context("Import failed")?;

    let outcome = session.outcome();
    let report = outcome.report();
    if !report.is_empty() {
        println!("{}", report);
    }
    info!(
        session_id = %session.session_id,
        processed = outcome.processed_count,
        errors = outcome.errors.len(),
        warnings = outcome.warnings.len(),
        "Import finished"
    );

    if outcome.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
