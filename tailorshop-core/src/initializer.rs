//! One-shot startup gate.
//!
//! Decides whether the application has usable data: fresh from the server,
//! or from the local cache when the server cannot be reached. Success is
//! remembered for the lifetime of the initializer; failure is not, so the
//! caller can offer a retry.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connectivity::Connectivity;
use crate::error::StorageError;
use crate::remote::RemoteApi;
use crate::route::Endpoints;
use crate::store::{CacheStats, LocalStore};
use crate::sync::refresh::{fetch_collections, persist_collections, FETCH_TIMEOUT};

type InitFuture = Shared<BoxFuture<'static, bool>>;

pub struct DataInitializer {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    endpoints: Endpoints,
    connectivity: Connectivity,
    fetch_timeout: Duration,
    initialized: AtomicBool,
    in_flight: Mutex<Option<InitFuture>>,
}

/// Owned copy of everything one initialization run needs.
struct InitRun {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    endpoints: Endpoints,
    connectivity: Connectivity,
    fetch_timeout: Duration,
}

impl DataInitializer {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        endpoints: Endpoints,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            store,
            remote,
            endpoints,
            connectivity,
            fetch_timeout: FETCH_TIMEOUT,
            initialized: AtomicBool::new(false),
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns whether the app can proceed. Concurrent callers share a
    /// single run.
    pub async fn initialize(&self) -> bool {
        if self.is_initialized() {
            return true;
        }

        let run = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.as_ref() {
                Some(run) => run.clone(),
                None => {
                    let run = self.snapshot().execute().boxed().shared();
                    *in_flight = Some(run.clone());
                    run
                }
            }
        };

        let ok = run.clone().await;
        if ok {
            self.initialized.store(true, Ordering::SeqCst);
        }

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.as_ref().is_some_and(|current| current.ptr_eq(&run)) {
            *in_flight = None;
        }

        ok
    }

    /// True if any entity table has at least one row. Storage failures
    /// count as "no cache".
    pub async fn has_cached_data(&self) -> bool {
        has_cached_data(&self.store).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, StorageError> {
        self.store.stats().await
    }

    /// Wipes all cached tables and the operation queue. The next
    /// `initialize` runs from scratch.
    pub async fn clear_cache(&self) -> Result<(), StorageError> {
        self.store.clear_all().await?;
        self.initialized.store(false, Ordering::SeqCst);
        tracing::info!("Cache cleared");
        Ok(())
    }

    fn snapshot(&self) -> InitRun {
        InitRun {
            store: self.store.clone(),
            remote: Arc::clone(&self.remote),
            endpoints: self.endpoints.clone(),
            connectivity: self.connectivity.clone(),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl InitRun {
    async fn execute(self) -> bool {
        tracing::info!("Initializing app data...");

        match self.try_execute().await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!("Error during initialization: {}", e);
                let has_cache = has_cached_data(&self.store).await;
                if has_cache {
                    tracing::warn!("Error occurred, but cached data is available");
                }
                has_cache
            }
        }
    }

    async fn try_execute(&self) -> Result<bool, StorageError> {
        let stats = self.store.stats().await?;
        let has_cache = stats.has_data();
        tracing::info!(
            "Cache status: {} (customers {}, orders {}, employees {}, suit types {})",
            if has_cache { "available" } else { "empty" },
            stats.customers,
            stats.orders,
            stats.employees,
            stats.suit_types
        );

        if !self.connectivity.is_online() {
            if has_cache {
                tracing::info!("Offline - using cached data");
            } else {
                tracing::warn!("Offline and no cached data available");
            }
            return Ok(has_cache);
        }

        tracing::info!("Online - fetching fresh data from server...");
        let fetches =
            fetch_collections(self.remote.as_ref(), &self.endpoints, self.fetch_timeout).await;

        if fetches.iter().any(|f| f.records.is_some()) {
            persist_collections(&self.store, &fetches).await?;
            tracing::info!("Fresh data loaded from server");
            return Ok(true);
        }

        if has_cache {
            tracing::warn!("Server unreachable, using cached data");
        } else {
            tracing::warn!("No server connection and no cached data");
        }
        Ok(has_cache)
    }
}

async fn has_cached_data(store: &LocalStore) -> bool {
    match store.stats().await {
        Ok(stats) => stats.has_data(),
        Err(e) => {
            tracing::error!("Error checking cached data: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, Record};
    use crate::store::tests::{setup_store, TestStore};
    use crate::testing::{FakeRemote, BASE_URL};
    use serde_json::json;

    struct TestContext {
        initializer: Arc<DataInitializer>,
        remote: Arc<FakeRemote>,
        store: LocalStore,
        _store: TestStore,
    }

    async fn setup(online: bool) -> TestContext {
        let test_store = setup_store().await;
        let remote = FakeRemote::new();
        let initializer = DataInitializer::new(
            test_store.store.clone(),
            remote.clone(),
            Endpoints::new(BASE_URL),
            Connectivity::new(online),
        );
        TestContext {
            initializer: Arc::new(initializer),
            remote,
            store: test_store.store.clone(),
            _store: test_store,
        }
    }

    async fn seed_cache(store: &LocalStore) {
        store
            .put(
                EntityKind::Customers,
                &Record::from_value(json!({"_id": "c-cached", "name": "Cached"})).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_online_fetch_populates_cache() {
        let ctx = setup(true).await;
        ctx.remote.seed(EntityKind::Orders, vec![json!({"_id": "o1"})]);
        ctx.remote
            .seed(EntityKind::SuitTypes, vec![json!({"_id": "s1"}), json!({"_id": "s2"})]);

        assert!(ctx.initializer.initialize().await);
        assert!(ctx.initializer.is_initialized());

        let stats = ctx.initializer.cache_stats().await.unwrap();
        assert_eq!(stats.orders, 1);
        assert_eq!(stats.suit_types, 2);
    }

    #[tokio::test]
    async fn test_total_outage_with_cache_succeeds_and_keeps_cache() {
        let ctx = setup(true).await;
        seed_cache(&ctx.store).await;
        ctx.remote.set_offline(true);

        assert!(ctx.initializer.initialize().await);

        let cached = ctx.store.get_all(EntityKind::Customers).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id(), Some("c-cached"));
    }

    #[tokio::test]
    async fn test_total_outage_without_cache_fails() {
        let ctx = setup(true).await;
        ctx.remote.set_offline(true);

        assert!(!ctx.initializer.initialize().await);
        assert!(!ctx.initializer.is_initialized());
    }

    #[tokio::test]
    async fn test_offline_uses_cache_without_network() {
        let ctx = setup(false).await;
        seed_cache(&ctx.store).await;

        assert!(ctx.initializer.initialize().await);
        assert!(ctx.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offline_without_cache_fails() {
        let ctx = setup(false).await;
        assert!(!ctx.initializer.initialize().await);
        assert!(ctx.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_outage_still_succeeds() {
        let ctx = setup(true).await;
        ctx.remote.seed(EntityKind::Employees, vec![json!({"_id": "e1"})]);
        ctx.remote.fail_kind(EntityKind::Customers);
        ctx.remote.fail_kind(EntityKind::Orders);
        seed_cache(&ctx.store).await;

        assert!(ctx.initializer.initialize().await);

        let stats = ctx.initializer.cache_stats().await.unwrap();
        assert_eq!(stats.employees, 1);
        // The failed collection keeps what it had.
        assert_eq!(stats.customers, 1);
    }

    #[tokio::test]
    async fn test_success_is_memoized() {
        let ctx = setup(true).await;
        assert!(ctx.initializer.initialize().await);
        let calls = ctx.remote.calls().len();

        assert!(ctx.initializer.initialize().await);
        assert_eq!(ctx.remote.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_failure_is_not_memoized() {
        let ctx = setup(true).await;
        ctx.remote.set_offline(true);
        assert!(!ctx.initializer.initialize().await);

        ctx.remote.set_offline(false);
        assert!(ctx.initializer.initialize().await);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let ctx = setup(true).await;
        let (entered, release) = ctx.remote.hold_next_get();

        let first = {
            let initializer = ctx.initializer.clone();
            tokio::spawn(async move { initializer.initialize().await })
        };
        entered.notified().await;

        let second = {
            let initializer = ctx.initializer.clone();
            tokio::spawn(async move { initializer.initialize().await })
        };
        tokio::task::yield_now().await;
        release.notify_one();

        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(ctx.remote.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_storage_failure_reports_no_cache() {
        let ctx = setup(true).await;
        ctx.store.pool().close().await;

        assert!(!ctx.initializer.has_cached_data().await);
        assert!(!ctx.initializer.initialize().await);
    }

    #[tokio::test]
    async fn test_clear_cache_resets_state() {
        let ctx = setup(true).await;
        ctx.remote.seed(EntityKind::Customers, vec![json!({"_id": "c1"})]);
        assert!(ctx.initializer.initialize().await);
        assert!(ctx.initializer.has_cached_data().await);

        ctx.initializer.clear_cache().await.unwrap();
        assert!(!ctx.initializer.is_initialized());
        assert!(!ctx.initializer.has_cached_data().await);
    }
}
