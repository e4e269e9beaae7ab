//! Import session database operations
//!
//! Sessions are the persisted record of an import run: state, issues and
//! the processed count. Issue lists are stored as JSON.

use registry_common::time::ImportPeriod;
use registry_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ImportSession, ImportState, RowIssue};

/// Save import session to database
pub async fn save_session(pool: &SqlitePool, session: &ImportSession) -> Result<()> {
    let state = serde_json::to_string(&session.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let warnings = serde_json::to_string(&session.warnings)
        .map_err(|e| Error::Internal(format!("Failed to serialize warnings: {}", e)))?;
    let errors = serde_json::to_string(&session.errors)
        .map_err(|e| Error::Internal(format!("Failed to serialize errors: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO import_sessions (
            session_id, region_id, period, state, ignore_errors,
            processed_count, warnings, errors, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            state = excluded.state,
            processed_count = excluded.processed_count,
            warnings = excluded.warnings,
            errors = excluded.errors,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(session.session_id.to_string())
    .bind(session.region_id)
    .bind(session.period.to_string())
    .bind(&state)
    .bind(session.ignore_errors)
    .bind(session.processed_count as i64)
    .bind(&warnings)
    .bind(&errors)
    .bind(session.started_at.to_rfc3339())
    .bind(session.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load import session from database
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<ImportSession>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, region_id, period, state, ignore_errors,
               processed_count, warnings, errors, started_at, ended_at
        FROM import_sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let period: String = row.get("period");
    let period: ImportPeriod = period.parse()?;

    let state: String = row.get("state");
    let state: ImportState = serde_json::from_str(&state)
        .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

    let warnings: String = row.get("warnings");
    let warnings: Vec<RowIssue> = serde_json::from_str(&warnings)
        .map_err(|e| Error::Internal(format!("Failed to deserialize warnings: {}", e)))?;

    let errors: String = row.get("errors");
    let errors: Vec<RowIssue> = serde_json::from_str(&errors)
        .map_err(|e| Error::Internal(format!("Failed to deserialize errors: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(Some(ImportSession {
        session_id,
        region_id: row.get("region_id"),
        period,
        ignore_errors: row.get("ignore_errors"),
        state,
        warnings,
        errors,
        processed_count: row.get::<i64, _>("processed_count") as usize,
        started_at,
        ended_at,
    }))
}

/// Most recent sessions for a region, newest first
pub async fn list_sessions(pool: &SqlitePool, region_id: i64, limit: i64) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT session_id FROM import_sessions WHERE region_id = ? ORDER BY started_at DESC LIMIT ?",
    )
    .bind(region_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("session_id");
            Uuid::parse_str(&id)
                .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))
        })
        .collect()
}
