//! Offline-aware request gateway.
//!
//! Each operation makes at most one network attempt. On success the local
//! store is updated from the server's answer; on failure (or while believed
//! offline) the store is read or mutated directly and mutations are queued
//! for the sync service. Network errors are never returned to the caller.

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::connectivity::Connectivity;
use crate::error::OfflineError;
use crate::models::{EntityKind, NewOperation, Record};
use crate::remote::RemoteApi;
use crate::route::Route;
use crate::store::LocalStore;

const TEMP_ID_PREFIX: &str = "temp_";
const TEMP_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Confirmed by the server.
    Server,
    /// Read from the local store.
    Cache,
    /// Applied locally and queued for replay.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadData {
    One(Option<Record>),
    Many(Vec<Record>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched {
    pub data: ReadData,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Written {
    pub record: Record,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Removed {
    pub source: Source,
}

/// Generates a placeholder key for a record created offline:
/// `temp_<epoch millis>_<9 base36 chars>`.
pub fn temporary_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| TEMP_ID_ALPHABET[rng.random_range(0..TEMP_ID_ALPHABET.len())] as char)
        .collect();
    format!(
        "{}{}_{}",
        TEMP_ID_PREFIX,
        Utc::now().timestamp_millis(),
        suffix
    )
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

pub struct Gateway {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    connectivity: Connectivity,
}

impl Gateway {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, connectivity: Connectivity) -> Self {
        Self {
            store,
            remote,
            connectivity,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Reads a collection or a single record.
    pub async fn read(&self, url: &str) -> Result<Fetched, OfflineError> {
        let route = Route::parse(url);

        if self.connectivity.is_online() {
            match self.remote.get(url).await {
                Ok(value) => {
                    let data = read_data(value);
                    if let Ok(route) = &route {
                        self.cache_read(route, &data).await?;
                    }
                    return Ok(Fetched {
                        data,
                        source: Source::Server,
                    });
                }
                Err(e) => tracing::warn!("GET {} failed, reading from cache: {}", url, e),
            }
        }

        let route = route?;
        let data = match &route.id {
            Some(id) => ReadData::One(
                self.store
                    .get(route.kind, id)
                    .await?
                    .filter(|r| !r.is_deleted()),
            ),
            None => ReadData::Many(
                self.store
                    .get_all(route.kind)
                    .await?
                    .into_iter()
                    .filter(|r| !r.is_deleted())
                    .collect(),
            ),
        };

        Ok(Fetched {
            data,
            source: Source::Cache,
        })
    }

    /// Creates a record. Offline, the record is stored under a temporary id
    /// and a CREATE is queued.
    pub async fn create(&self, url: &str, payload: Record) -> Result<Written, OfflineError> {
        let route = Route::parse(url);
        let body = payload.without_local_fields().into_value();

        if self.connectivity.is_online() {
            match self.remote.post(url, &body).await {
                Ok(value) => return self.confirmed_write(route.ok(), value).await,
                Err(e) => tracing::warn!("POST {} failed, queued for sync: {}", url, e),
            }
        }

        let route = route?;
        let temp_id = temporary_id();

        let mut record = payload;
        record.set_id(&temp_id);
        record.mark_created_offline(Utc::now().timestamp_millis());

        self.store
            .enqueue(NewOperation::create(route.kind, url, body, temp_id))
            .await?;
        self.store.put(route.kind, &record).await?;
        tracing::info!("Queued CREATE {}", url);

        Ok(Written {
            record,
            source: Source::Queued,
        })
    }

    /// Updates a record. The target id is the payload's `_id`, or the
    /// trailing URL segment. Offline, the payload is merged over the cached
    /// record and an UPDATE is queued.
    pub async fn update(&self, url: &str, payload: Record) -> Result<Written, OfflineError> {
        let route = Route::parse(url);
        let body = payload.without_local_fields().into_value();

        if self.connectivity.is_online() {
            match self.remote.put(url, &body).await {
                Ok(value) => return self.confirmed_write(route.ok(), value).await,
                Err(e) => tracing::warn!("PUT {} failed, queued for sync: {}", url, e),
            }
        }

        let route = route?;
        let id = payload
            .id()
            .map(str::to_string)
            .or_else(|| route.id.clone())
            .ok_or_else(|| OfflineError::UnsupportedEndpoint(url.to_string()))?;

        let mut record = self.store.get(route.kind, &id).await?.unwrap_or_default();
        record.merge(&payload);
        record.set_id(&id);
        record.mark_updated_offline(Utc::now().timestamp_millis());

        self.store
            .enqueue(NewOperation::update(route.kind, url, body, id))
            .await?;
        self.store.put(route.kind, &record).await?;
        tracing::info!("Queued UPDATE {}", url);

        Ok(Written {
            record,
            source: Source::Queued,
        })
    }

    /// Deletes a record. Offline, the cached record is soft-deleted (hidden
    /// from reads but kept) and a DELETE is queued. Always acknowledges.
    pub async fn remove(&self, url: &str) -> Result<Removed, OfflineError> {
        let route = Route::parse(url);

        if self.connectivity.is_online() {
            match self.remote.delete(url).await {
                Ok(()) => {
                    if let Ok(Route { kind, id: Some(id) }) = &route {
                        self.store.delete(*kind, id).await?;
                    }
                    return Ok(Removed {
                        source: Source::Server,
                    });
                }
                Err(e) => tracing::warn!("DELETE {} failed, queued for sync: {}", url, e),
            }
        }

        let route = route?;
        let id = route
            .id
            .clone()
            .ok_or_else(|| OfflineError::UnsupportedEndpoint(url.to_string()))?;

        self.store
            .enqueue(NewOperation::delete(route.kind, url, id.clone()))
            .await?;
        if let Some(mut record) = self.store.get(route.kind, &id).await? {
            record.mark_deleted_offline();
            self.store.put(route.kind, &record).await?;
        }
        tracing::info!("Queued DELETE {}", url);

        Ok(Removed {
            source: Source::Queued,
        })
    }

    async fn cache_read(&self, route: &Route, data: &ReadData) -> Result<(), OfflineError> {
        match data {
            ReadData::Many(records) if !route.is_item() => {
                let keyed = keyed_only(route.kind, records);
                self.store.upsert_all(route.kind, &keyed).await?;
            }
            ReadData::One(Some(record)) if record.id().is_some() => {
                self.store.put(route.kind, record).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn confirmed_write(
        &self,
        route: Option<Route>,
        value: Value,
    ) -> Result<Written, OfflineError> {
        let record = Record::from_value(value).unwrap_or_else(|| {
            tracing::warn!("Server response was not an object");
            Record::new()
        });

        if let Some(route) = route {
            if record.id().is_some() {
                self.store.put(route.kind, &record).await?;
            }
        }

        Ok(Written {
            record,
            source: Source::Server,
        })
    }
}

fn read_data(value: Value) -> ReadData {
    match value {
        Value::Array(items) => {
            ReadData::Many(items.into_iter().filter_map(Record::from_value).collect())
        }
        other => ReadData::One(Record::from_value(other)),
    }
}

fn keyed_only(kind: EntityKind, records: &[Record]) -> Vec<Record> {
    let keyed: Vec<Record> = records.iter().filter(|r| r.id().is_some()).cloned().collect();
    if keyed.len() != records.len() {
        tracing::warn!(
            "Skipping {} {} record(s) without an _id",
            records.len() - keyed.len(),
            kind
        );
    }
    keyed
}
