//! Persistence gateway
//!
//! The narrow contract the hub uses to reach the durable store. Each call is atomic on
//! its own; nothing here spans more than one document. Every call is bounded by the
//! configured timeout and an elapsed deadline surfaces as [`Error::Timeout`].

use sitesync_common::db;
use sitesync_common::events::NewMaterial;
use sitesync_common::{Error, MaterialRecord, Result, Site};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

/// Result of a delete by identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    NotFound,
}

#[derive(Clone)]
pub struct PersistenceGateway {
    pool: SqlitePool,
    timeout: Duration,
}

impl PersistenceGateway {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_material(
        &self,
        new: &NewMaterial,
        added_by: &str,
        timestamp: &str,
    ) -> Result<MaterialRecord> {
        self.bounded(db::materials::insert_material(&self.pool, new, added_by, timestamp))
            .await
    }

    pub async fn find_material(&self, id: &str) -> Result<Option<MaterialRecord>> {
        self.bounded(db::materials::find_material(&self.pool, id)).await
    }

    pub async fn delete_material(&self, id: &str) -> Result<Deletion> {
        let removed = self
            .bounded(db::materials::delete_material(&self.pool, id))
            .await?;
        Ok(if removed {
            Deletion::Deleted
        } else {
            Deletion::NotFound
        })
    }

    pub async fn list_materials(&self, site_id: &str) -> Result<Vec<MaterialRecord>> {
        self.bounded(db::materials::list_materials(&self.pool, site_id))
            .await
    }

    pub async fn insert_site(&self, name: &str, location: &str, created_by: &str) -> Result<Site> {
        self.bounded(db::sites::insert_site(&self.pool, name, location, created_by))
            .await
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        self.bounded(db::sites::list_sites(&self.pool)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_millis() as u64))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn gateway() -> PersistenceGateway {
        let pool = db::init_memory_pool().await.unwrap();
        PersistenceGateway::new(pool, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let gateway = gateway().await;
        let new = NewMaterial {
            site_id: "S1".to_string(),
            name: "Rebar".to_string(),
            quantity: 12.0,
            unit: "t".to_string(),
        };
        let record = gateway.insert_material(&new, "alice", "2026-10-18 10:00").await.unwrap();

        assert_eq!(gateway.delete_material(&record.id).await.unwrap(), Deletion::Deleted);
        assert_eq!(gateway.delete_material(&record.id).await.unwrap(), Deletion::NotFound);
    }

    #[tokio::test]
    async fn test_closed_store_is_an_error_not_a_panic() {
        let gateway = gateway().await;
        gateway.pool().close().await;

        assert!(gateway.find_material("anything").await.is_err());
        assert!(gateway.list_sites().await.is_err());
    }

    #[tokio::test]
    async fn test_elapsed_deadline_maps_to_timeout() {
        let gateway = gateway().await;
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };
        let quick = PersistenceGateway::new(gateway.pool().clone(), Duration::from_millis(10));

        assert!(matches!(quick.bounded(slow).await, Err(Error::Timeout(10))));
    }
}
