//! Site persistence

use crate::models::Site;
use crate::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Persist a new site and return it with its assigned identifier
pub async fn insert_site(
    pool: &SqlitePool,
    name: &str,
    location: &str,
    created_by: &str,
) -> Result<Site> {
    let site = Site {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        location: location.to_string(),
        created_by: created_by.to_string(),
    };

    sqlx::query("INSERT INTO sites (id, name, location, created_by) VALUES (?, ?, ?, ?)")
        .bind(&site.id)
        .bind(&site.name)
        .bind(&site.location)
        .bind(&site.created_by)
        .execute(pool)
        .await?;

    Ok(site)
}

/// All sites, in creation order
pub async fn list_sites(pool: &SqlitePool) -> Result<Vec<Site>> {
    let rows = sqlx::query("SELECT id, name, location, created_by FROM sites ORDER BY rowid")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Site {
            id: row.get("id"),
            name: row.get("name"),
            location: row.get("location"),
            created_by: row.get("created_by"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_insert_and_list_sites() {
        let pool = init_memory_pool().await.unwrap();

        let north = insert_site(&pool, "North Tower", "Pune", "carol").await.unwrap();
        let south = insert_site(&pool, "South Yard", "Nashik", "carol").await.unwrap();
        assert_ne!(north.id, south.id);

        let sites = list_sites(&pool).await.unwrap();
        assert_eq!(sites, vec![north, south]);
    }
}
