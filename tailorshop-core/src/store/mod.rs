//! Local persistent store.
//!
//! A SQLite database with one table per [`EntityKind`] plus the operation
//! queue. Every method is a single statement or a single transaction, so
//! individual operations are atomic; callers never need a higher-level lock.

mod queue;
mod records;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::StorageError;
use crate::models::EntityKind;

pub use queue::replace_path_segment;

/// Handle to the local store. Cheap to clone; clones share the pool.
#[derive(Clone, Debug)]
pub struct LocalStore {
    pool: SqlitePool,
}

/// Row counts per table plus the number of pending queue entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub customers: i64,
    pub orders: i64,
    pub employees: i64,
    pub suit_types: i64,
    pub pending_sync: i64,
}

impl CacheStats {
    pub fn count(&self, kind: EntityKind) -> i64 {
        match kind {
            EntityKind::Customers => self.customers,
            EntityKind::Orders => self.orders,
            EntityKind::Employees => self.employees,
            EntityKind::SuitTypes => self.suit_types,
        }
    }

    /// True if at least one entity table holds a row.
    pub fn has_data(&self) -> bool {
        EntityKind::ALL.into_iter().any(|kind| self.count(kind) > 0)
    }
}

impl LocalStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::CreateDir(parent.to_path_buf(), e))?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, running migrations on it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn stats(&self) -> Result<CacheStats, StorageError> {
        Ok(CacheStats {
            customers: self.count(EntityKind::Customers).await?,
            orders: self.count(EntityKind::Orders).await?,
            employees: self.count(EntityKind::Employees).await?,
            suit_types: self.count(EntityKind::SuitTypes).await?,
            pending_sync: self.queue_len().await?,
        })
    }

    /// Empties every entity table and the queue in one transaction.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for kind in EntityKind::ALL {
            sqlx::query(&format!("DELETE FROM {}", kind.table()))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM sync_queue")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
