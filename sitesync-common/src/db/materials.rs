//! Material record persistence
//!
//! Records are insert-once, delete-once. There is no update path.

use crate::events::NewMaterial;
use crate::models::MaterialRecord;
use crate::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Persist a new record and return it with its assigned identifier
pub async fn insert_material(
    pool: &SqlitePool,
    new: &NewMaterial,
    added_by: &str,
    timestamp: &str,
) -> Result<MaterialRecord> {
    let record = MaterialRecord {
        id: Uuid::new_v4().to_string(),
        site_id: new.site_id.clone(),
        name: new.name.clone(),
        quantity: new.quantity,
        unit: new.unit.clone(),
        added_by: added_by.to_string(),
        timestamp: timestamp.to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO materials (id, site_id, name, quantity, unit, added_by, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.site_id)
    .bind(&record.name)
    .bind(record.quantity)
    .bind(&record.unit)
    .bind(&record.added_by)
    .bind(&record.timestamp)
    .execute(pool)
    .await?;

    Ok(record)
}

/// Load a record by identifier
pub async fn find_material(pool: &SqlitePool, id: &str) -> Result<Option<MaterialRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, site_id, name, quantity, unit, added_by, timestamp
        FROM materials
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| material_from_row(&row)))
}

/// Delete a record by identifier
///
/// Returns `false` when no row matched, which is how the loser of a delete race
/// learns it lost.
pub async fn delete_material(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM materials WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All records for one site, oldest first
pub async fn list_materials(pool: &SqlitePool, site_id: &str) -> Result<Vec<MaterialRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, site_id, name, quantity, unit, added_by, timestamp
        FROM materials
        WHERE site_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(site_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(material_from_row).collect())
}

fn material_from_row(row: &sqlx::sqlite::SqliteRow) -> MaterialRecord {
    MaterialRecord {
        id: row.get("id"),
        site_id: row.get("site_id"),
        name: row.get("name"),
        quantity: row.get("quantity"),
        unit: row.get("unit"),
        added_by: row.get("added_by"),
        timestamp: row.get("timestamp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn cement(site_id: &str) -> NewMaterial {
        NewMaterial {
            site_id: site_id.to_string(),
            name: "Cement".to_string(),
            quantity: 50.0,
            unit: "bags".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let pool = init_memory_pool().await.expect("Failed to create in-memory database");

        let saved = insert_material(&pool, &cement("S1"), "alice", "2026-10-18 09:30")
            .await
            .expect("Failed to insert material");

        let loaded = find_material(&pool, &saved.id)
            .await
            .expect("Failed to load material")
            .expect("Material not found");

        assert_eq!(loaded, saved);
        assert_eq!(loaded.added_by, "alice");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_row() {
        let pool = init_memory_pool().await.unwrap();
        let saved = insert_material(&pool, &cement("S1"), "alice", "2026-10-18 09:30")
            .await
            .unwrap();

        assert!(delete_material(&pool, &saved.id).await.unwrap());
        assert!(!delete_material(&pool, &saved.id).await.unwrap());
        assert!(find_material(&pool, &saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_site() {
        let pool = init_memory_pool().await.unwrap();
        insert_material(&pool, &cement("S1"), "alice", "t").await.unwrap();
        insert_material(&pool, &cement("S1"), "bob", "t").await.unwrap();
        // Orphaned: no site "ghost" exists, still stored and listed
        insert_material(&pool, &cement("ghost"), "bob", "t").await.unwrap();

        let s1 = list_materials(&pool, "S1").await.unwrap();
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[0].added_by, "alice");

        assert_eq!(list_materials(&pool, "ghost").await.unwrap().len(), 1);
        assert!(list_materials(&pool, "S2").await.unwrap().is_empty());
    }
}
