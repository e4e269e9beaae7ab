//! Region persistence
//!
//! Regions are owned outside the import pipeline; these helpers exist so the
//! CLI and tests can seed and read them. The boundary is stored as JSON.

use crate::db::models::Region;
use crate::geo::Boundary;
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Insert or replace a region
pub async fn save_region(pool: &SqlitePool, region: &Region) -> Result<()> {
    let boundary = serde_json::to_string(&region.boundary)
        .map_err(|e| Error::Internal(format!("Serialize boundary failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO regions (id, name, boundary)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            boundary = excluded.boundary,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(region.id)
    .bind(&region.name)
    .bind(boundary)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a region by id
pub async fn load_region(pool: &SqlitePool, region_id: i64) -> Result<Region> {
    let row = sqlx::query("SELECT id, name, boundary FROM regions WHERE id = ?")
        .bind(region_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Region {}", region_id)))?;

    let boundary_json: String = row.get("boundary");
    let boundary: Boundary = serde_json::from_str(&boundary_json).map_err(|e| {
        Error::Internal(format!("Corrupt boundary for region {}: {}", region_id, e))
    })?;

    Ok(Region {
        id: row.get("id"),
        name: row.get("name"),
        boundary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::geo::{GeoPoint, Polygon};

    #[tokio::test]
    async fn test_region_save_and_load() {
        let pool = init_memory_database().await.unwrap();
        let region = Region {
            id: 4,
            name: "North".to_string(),
            boundary: Boundary::new(vec![Polygon::rectangle(
                GeoPoint::new(-1.0, 30.0),
                GeoPoint::new(1.0, 32.0),
            )]),
        };

        save_region(&pool, &region).await.unwrap();
        let loaded = load_region(&pool, 4).await.unwrap();
        assert_eq!(loaded, region);
    }

    #[tokio::test]
    async fn test_save_region_overwrites() {
        let pool = init_memory_database().await.unwrap();
        let mut region = Region {
            id: 1,
            name: "Old".to_string(),
            boundary: Boundary::default(),
        };
        save_region(&pool, &region).await.unwrap();

        region.name = "New".to_string();
        save_region(&pool, &region).await.unwrap();

        assert_eq!(load_region(&pool, 1).await.unwrap().name, "New");
    }

    #[tokio::test]
    async fn test_missing_region_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let result = load_region(&pool, 99).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
