//! Tailor Shop Core Library
//!
//! Offline-first data layer for the tailor shop client: a local SQLite
//! cache, a gateway that degrades to the cache and an operation queue when
//! the server is unreachable, a startup initializer, and a sync service that
//! replays the queue and refreshes the cache.

pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod initializer;
pub mod models;
pub mod remote;
pub mod route;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use connectivity::Connectivity;
pub use error::{OfflineError, StorageError};
pub use gateway::{
    is_temporary_id, temporary_id, Fetched, Gateway, ReadData, Removed, Source, Written,
};
pub use initializer::DataInitializer;
pub use models::{EntityKind, NewOperation, OperationKind, QueuedOperation, Record};
pub use remote::{HttpRemote, RemoteApi, RemoteError};
pub use route::{Endpoints, Route};
pub use store::{CacheStats, LocalStore};
pub use sync::{SkipReason, SyncEvent, SyncOutcome, SyncReport, SyncService};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
