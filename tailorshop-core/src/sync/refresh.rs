//! Full reconciling refetch of the four collections.

use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;

use crate::error::StorageError;
use crate::models::{EntityKind, Record};
use crate::remote::{get_with_timeout, RemoteApi};
use crate::route::Endpoints;
use crate::store::LocalStore;

/// Default bound on each collection fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of fetching one collection. `records` is `None` when the fetch
/// failed or timed out.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionFetch {
    pub kind: EntityKind,
    pub records: Option<Vec<Record>>,
}

/// Fetches every collection in parallel. Each fetch fails independently.
pub async fn fetch_collections(
    remote: &dyn RemoteApi,
    endpoints: &Endpoints,
    limit: Duration,
) -> Vec<CollectionFetch> {
    let fetches = EntityKind::ALL.into_iter().map(|kind| async move {
        let url = endpoints.collection(kind);
        let records = match get_with_timeout(remote, &url, limit).await {
            Ok(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(Record::from_value)
                    .filter(|r| r.id().is_some())
                    .collect(),
            ),
            Ok(_) => {
                tracing::warn!("Failed to fetch {}: response is not a list", kind);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", kind, e);
                None
            }
        };
        CollectionFetch { kind, records }
    });

    join_all(fetches).await
}

/// Writes every successful fetch into its table, replacing the confirmed
/// rows. Returns the kinds that were written.
pub async fn persist_collections(
    store: &LocalStore,
    fetches: &[CollectionFetch],
) -> Result<Vec<EntityKind>, StorageError> {
    let mut written = Vec::new();
    for fetch in fetches {
        if let Some(records) = &fetch.records {
            store.put_all(fetch.kind, records).await?;
            tracing::info!("Cached {} {}", records.len(), fetch.kind);
            written.push(fetch.kind);
        }
    }
    Ok(written)
}
