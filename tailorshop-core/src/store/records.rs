use sqlx::sqlite::SqliteExecutor;

use super::LocalStore;
use crate::error::StorageError;
use crate::models::{EntityKind, Record};

impl LocalStore {
    pub async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Record>, StorageError> {
        let sql = format!("SELECT body FROM {} WHERE id = ?", kind.table());
        let body: Option<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        body.map(|b| decode(&b)).transpose()
    }

    /// Every row of the table, including soft-deleted ones. Order is not
    /// meaningful.
    pub async fn get_all(&self, kind: EntityKind) -> Result<Vec<Record>, StorageError> {
        let sql = format!("SELECT body FROM {}", kind.table());
        let bodies: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;

        bodies.iter().map(|b| decode(b)).collect()
    }

    /// Inserts or overwrites the record under its `_id`.
    pub async fn put(&self, kind: EntityKind, record: &Record) -> Result<(), StorageError> {
        upsert(&self.pool, kind, record).await
    }

    /// Replaces the table's confirmed contents with `records` in a single
    /// transaction.
    ///
    /// Rows still flagged `_isOffline` are left in place unless `records`
    /// carries the same key, in which case the incoming row wins. If any
    /// record lacks a key nothing is written.
    pub async fn put_all(&self, kind: EntityKind, records: &[Record]) -> Result<(), StorageError> {
        if records.iter().any(|r| r.id().is_none()) {
            return Err(StorageError::MissingKey(kind));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE is_offline = 0", kind.table()))
            .execute(&mut *tx)
            .await?;

        for record in records {
            upsert(&mut *tx, kind, record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Inserts or overwrites each record in a single transaction. Rows not
    /// named in `records` are untouched.
    pub async fn upsert_all(&self, kind: EntityKind, records: &[Record]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            upsert(&mut *tx, kind, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, kind: EntityKind, key: &str) -> Result<(), StorageError> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear(&self, kind: EntityKind) -> Result<(), StorageError> {
        sqlx::query(&format!("DELETE FROM {}", kind.table()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self, kind: EntityKind) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", kind.table()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn upsert<'e, E>(executor: E, kind: EntityKind, record: &Record) -> Result<(), StorageError>
where
    E: SqliteExecutor<'e>,
{
    let id = record.id().ok_or(StorageError::MissingKey(kind))?;
    let body = serde_json::to_string(record)?;

    let sql = format!(
        "INSERT INTO {} (id, body, is_offline) VALUES (?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET body = excluded.body, is_offline = excluded.is_offline",
        kind.table()
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(body)
        .bind(record.is_offline())
        .execute(executor)
        .await?;
    Ok(())
}

fn decode(body: &str) -> Result<Record, StorageError> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::setup_store;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn ids(records: &[Record]) -> BTreeSet<String> {
        records
            .iter()
            .filter_map(|r| r.id().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        let customer = record(json!({"_id": "c1", "name": "Usman", "phone": "0300"}));
        store.put(EntityKind::Customers, &customer).await.unwrap();

        let fetched = store.get(EntityKind::Customers, "c1").await.unwrap();
        assert_eq!(fetched, Some(customer));

        // Tables are independent.
        assert!(store.get(EntityKind::Orders, "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_by_key() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .put(EntityKind::Employees, &record(json!({"_id": "e1", "name": "A"})))
            .await
            .unwrap();
        store
            .put(EntityKind::Employees, &record(json!({"_id": "e1", "name": "B"})))
            .await
            .unwrap();

        let all = store.get_all(EntityKind::Employees).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get("name"), Some(&json!("B")));
    }

    #[tokio::test]
    async fn test_put_without_key_fails() {
        let ctx = setup_store().await;
        let err = ctx
            .store
            .put(EntityKind::Customers, &record(json!({"name": "nobody"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::MissingKey(EntityKind::Customers)));
    }

    #[tokio::test]
    async fn test_put_all_twice_is_idempotent() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        let records = vec![
            record(json!({"_id": "s1", "name": "Kurta"})),
            record(json!({"_id": "s2", "name": "Waistcoat"})),
        ];
        store.put_all(EntityKind::SuitTypes, &records).await.unwrap();
        store.put_all(EntityKind::SuitTypes, &records).await.unwrap();

        let all = store.get_all(EntityKind::SuitTypes).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(ids(&all), ids(&records));
    }

    #[tokio::test]
    async fn test_put_all_replaces_stale_rows() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .put_all(
                EntityKind::Orders,
                &[record(json!({"_id": "o1"})), record(json!({"_id": "o2"}))],
            )
            .await
            .unwrap();
        store
            .put_all(
                EntityKind::Orders,
                &[record(json!({"_id": "o2"})), record(json!({"_id": "o3"}))],
            )
            .await
            .unwrap();

        let all = store.get_all(EntityKind::Orders).await.unwrap();
        assert_eq!(
            ids(&all),
            ["o2", "o3"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[tokio::test]
    async fn test_put_all_keeps_unconfirmed_rows() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        let mut pending = record(json!({"_id": "temp_1", "name": "new"}));
        pending.mark_created_offline(1);
        store.put(EntityKind::Customers, &pending).await.unwrap();
        store
            .put(EntityKind::Customers, &record(json!({"_id": "c-old"})))
            .await
            .unwrap();

        store
            .put_all(EntityKind::Customers, &[record(json!({"_id": "c1"}))])
            .await
            .unwrap();

        let all = store.get_all(EntityKind::Customers).await.unwrap();
        assert_eq!(
            ids(&all),
            ["c1", "temp_1"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[tokio::test]
    async fn test_put_all_server_row_wins_over_offline_row() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        let mut local = record(json!({"_id": "c1", "name": "local"}));
        local.mark_updated_offline(1);
        store.put(EntityKind::Customers, &local).await.unwrap();

        store
            .put_all(
                EntityKind::Customers,
                &[record(json!({"_id": "c1", "name": "server"}))],
            )
            .await
            .unwrap();

        let fetched = store.get(EntityKind::Customers, "c1").await.unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&json!("server")));
        assert!(!fetched.is_offline());
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .put(EntityKind::Orders, &record(json!({"_id": "o1"})))
            .await
            .unwrap();

        let result = store
            .put_all(
                EntityKind::Orders,
                &[record(json!({"_id": "o2"})), record(json!({"total": 5}))],
            )
            .await;
        assert!(result.is_err());

        let all = store.get_all(EntityKind::Orders).await.unwrap();
        assert_eq!(ids(&all), ["o1"].iter().map(|s| s.to_string()).collect());
    }

    #[tokio::test]
    async fn test_upsert_all_keeps_unlisted_rows() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .put_all(
                EntityKind::Customers,
                &[record(json!({"_id": "c1"})), record(json!({"_id": "c2", "v": 1}))],
            )
            .await
            .unwrap();

        store
            .upsert_all(
                EntityKind::Customers,
                &[record(json!({"_id": "c2", "v": 2})), record(json!({"_id": "c3"}))],
            )
            .await
            .unwrap();

        let all = store.get_all(EntityKind::Customers).await.unwrap();
        assert_eq!(
            ids(&all),
            ["c1", "c2", "c3"].iter().map(|s| s.to_string()).collect()
        );
        let c2 = store.get(EntityKind::Customers, "c2").await.unwrap().unwrap();
        assert_eq!(c2.get("v"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_upsert_all_is_all_or_nothing() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        let result = store
            .upsert_all(
                EntityKind::Orders,
                &[record(json!({"_id": "o1"})), record(json!({"total": 5}))],
            )
            .await;
        assert!(result.is_err());
        assert_eq!(store.count(EntityKind::Orders).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        for id in ["e1", "e2", "e3"] {
            store
                .put(EntityKind::Employees, &record(json!({"_id": id})))
                .await
                .unwrap();
        }

        store.delete(EntityKind::Employees, "e2").await.unwrap();
        assert_eq!(store.count(EntityKind::Employees).await.unwrap(), 2);
        assert!(store.get(EntityKind::Employees, "e2").await.unwrap().is_none());

        // Deleting a missing key is not an error.
        store.delete(EntityKind::Employees, "nope").await.unwrap();

        store.clear(EntityKind::Employees).await.unwrap();
        assert_eq!(store.count(EntityKind::Employees).await.unwrap(), 0);
    }
}
