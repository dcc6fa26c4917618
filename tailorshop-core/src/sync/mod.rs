//! Background reconciliation: queue replay followed by a full refetch.

mod events;
pub(crate) mod refresh;
mod service;

pub use events::{SkipReason, SyncEvent, SyncOutcome, SyncReport};
pub use refresh::{fetch_collections, persist_collections, CollectionFetch, FETCH_TIMEOUT};
pub use service::{SyncService, DEFAULT_SYNC_INTERVAL, MAX_RETRIES};
