use chrono::Utc;
use serde_json::Value;
use std::str::FromStr;

use super::LocalStore;
use crate::error::StorageError;
use crate::models::{EntityKind, NewOperation, OperationKind, QueuedOperation, ID_FIELD};

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: i64,
    op_type: String,
    entity: String,
    url: String,
    payload: Option<String>,
    temporary_id: Option<String>,
    record_id: Option<String>,
    retries: i64,
    timestamp: i64,
}

impl LocalStore {
    /// Appends a mutation to the queue and returns its assigned id.
    pub async fn enqueue(&self, op: NewOperation) -> Result<i64, StorageError> {
        let payload = op.payload.as_ref().map(serde_json::to_string).transpose()?;
        let timestamp = Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (op_type, entity, url, payload, temporary_id, record_id, retries, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(op.kind.as_str())
        .bind(op.entity.segment())
        .bind(&op.url)
        .bind(payload)
        .bind(&op.temporary_id)
        .bind(&op.record_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All pending entries in replay (FIFO) order.
    pub async fn list_queue(&self) -> Result<Vec<QueuedOperation>, StorageError> {
        let rows: Vec<QueueRow> = sqlx::query_as("SELECT * FROM sync_queue ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(hydrate).collect()
    }

    pub async fn dequeue(&self, id: i64) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_queue(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sync_queue")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn queue_len(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Bumps the persisted retry counter and returns the new value, or
    /// `None` if the entry no longer exists.
    pub async fn increment_retries(&self, id: i64) -> Result<Option<u32>, StorageError> {
        let retries: Option<i64> =
            sqlx::query_scalar("UPDATE sync_queue SET retries = retries + 1 WHERE id = ? RETURNING retries")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(retries.map(|r| r.max(0) as u32))
    }

    /// Points entries that still reference a temporary id at the id the
    /// server assigned. Rewrites the URL segment, the target id and a
    /// payload `_id`. Returns the number of entries changed.
    pub async fn retarget_queue(&self, temporary_id: &str, server_id: &str) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<QueueRow> = sqlx::query_as("SELECT * FROM sync_queue ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await?;

        let mut changed = 0;
        for row in rows {
            let url = replace_path_segment(&row.url, temporary_id, server_id);
            let record_id = row
                .record_id
                .as_deref()
                .map(|id| if id == temporary_id { server_id } else { id });
            let payload = match row.payload.as_deref() {
                Some(text) => {
                    let mut value: Value = serde_json::from_str(text)?;
                    if value.get(ID_FIELD).and_then(Value::as_str) == Some(temporary_id) {
                        value[ID_FIELD] = Value::String(server_id.to_string());
                    }
                    Some(serde_json::to_string(&value)?)
                }
                None => None,
            };

            let touched = url != row.url
                || record_id != row.record_id.as_deref()
                || payload.as_deref().map(parse_loose) != row.payload.as_deref().map(parse_loose);
            if !touched {
                continue;
            }

            sqlx::query("UPDATE sync_queue SET url = ?, record_id = ?, payload = ? WHERE id = ?")
                .bind(&url)
                .bind(record_id)
                .bind(&payload)
                .bind(row.id)
                .execute(&mut *tx)
                .await?;
            changed += 1;
        }

        tx.commit().await?;
        Ok(changed)
    }
}

/// Replaces every path segment equal to `from` with `to`, leaving the
/// scheme, host and query untouched.
pub fn replace_path_segment(url: &str, from: &str, to: &str) -> String {
    let (path, suffix) = match url.find(['?', '#']) {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let rewritten: Vec<&str> = path
        .split('/')
        .map(|segment| if segment == from { to } else { segment })
        .collect();
    format!("{}{}", rewritten.join("/"), suffix)
}

fn parse_loose(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

fn hydrate(row: QueueRow) -> Result<QueuedOperation, StorageError> {
    let id = row.id;
    let corrupt = move |reason: String| StorageError::CorruptQueueEntry { id, reason };

    let kind = OperationKind::from_str(&row.op_type).map_err(corrupt)?;
    let entity = EntityKind::from_segment(&row.entity)
        .ok_or_else(|| corrupt(format!("unknown entity '{}'", row.entity)))?;
    let payload: Option<Value> = row
        .payload
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(QueuedOperation {
        id: row.id,
        kind,
        entity,
        url: row.url,
        payload,
        temporary_id: row.temporary_id,
        record_id: row.record_id,
        retries: row.retries.max(0) as u32,
        timestamp: row.timestamp,
    })
}
