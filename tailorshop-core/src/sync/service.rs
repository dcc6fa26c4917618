use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::events::{SkipReason, SyncEvent, SyncOutcome, SyncReport};
use super::refresh::{fetch_collections, persist_collections, FETCH_TIMEOUT};
use crate::connectivity::Connectivity;
use crate::error::StorageError;
use crate::models::{OperationKind, QueuedOperation, Record};
use crate::remote::{RemoteApi, RemoteError};
use crate::route::Endpoints;
use crate::store::LocalStore;

/// Failed replays tolerated before an entry is dropped.
pub const MAX_RETRIES: u32 = 5;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_CAPACITY: usize = 64;

/// Replays the operation queue against the server and then refreshes every
/// collection from it.
///
/// Construct one per application, call [`SyncService::start`] to run it in
/// the background and [`SyncService::stop`] to shut it down. [`SyncService::sync`]
/// can also be called directly; overlapping calls are dropped, not queued.
pub struct SyncService {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    endpoints: Endpoints,
    connectivity: Connectivity,
    interval: Duration,
    fetch_timeout: Duration,
    syncing: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
    worker: Mutex<Option<Worker>>,
}

/// The running background loop and the signal that ends it.
struct Worker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// Clears the in-progress flag however the pass ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncService {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        endpoints: Endpoints,
        connectivity: Connectivity,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            remote,
            endpoints,
            connectivity,
            interval: DEFAULT_SYNC_INTERVAL,
            fetch_timeout: FETCH_TIMEOUT,
            syncing: AtomicBool::new(false),
            events,
            worker: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Whether the background task is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Spawns the background task: an immediate sync if online, then a sync
    /// on every transition to online and on every interval tick while
    /// online. Calling it again while running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }

        let mut online = self.connectivity.subscribe();
        online.borrow_and_update();
        let shutdown = Arc::new(Notify::new());

        let service = Arc::clone(self);
        let signal = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move { service.run(online, signal).await });
        *worker = Some(Worker { handle, shutdown });
        tracing::info!("Sync service started (interval {:?})", self.interval);
    }

    /// Stops the timer and connectivity triggers. A pass already in
    /// progress runs to completion before this returns.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            worker.shutdown.notify_one();
            if let Err(e) = worker.handle.await {
                tracing::error!("Sync task ended abnormally: {}", e);
            }
            tracing::info!("Sync service stopped");
        }
    }

    async fn run(self: Arc<Self>, mut online: watch::Receiver<bool>, shutdown: Arc<Notify>) {
        if self.connectivity.is_online() {
            self.sync().await;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *online.borrow_and_update() {
                        tracing::info!("Connection restored, syncing");
                        self.sync().await;
                    }
                }
                _ = ticker.tick() => {
                    if self.connectivity.is_online() && !self.is_syncing() {
                        self.sync().await;
                    }
                }
            }
        }
    }

    /// Runs one pass: replay the queue in FIFO order, then refetch all
    /// collections. Network failures are absorbed; a storage failure ends
    /// the pass early and is recorded in the report.
    pub async fn sync(&self) -> SyncOutcome {
        if !self.connectivity.is_online() {
            tracing::debug!("Offline, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync already in progress");
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        }
        let _guard = SyncGuard(&self.syncing);

        tracing::info!("Starting sync...");
        self.emit(SyncEvent::Started);
        self.emit(SyncEvent::Progress(10));

        let mut report = SyncReport::default();
        if let Err(e) = self.run_pass(&mut report).await {
            tracing::error!("Sync failed: {}", e);
            report.error = Some(e.to_string());
        }

        self.emit(SyncEvent::Progress(100));
        tracing::info!(
            "Sync completed: {} replayed, {} failed, {} abandoned, {} collection(s) refreshed",
            report.replayed,
            report.failed,
            report.abandoned,
            report.refreshed.len()
        );
        self.emit(SyncEvent::Completed(report.clone()));

        SyncOutcome::Completed(report)
    }

    async fn run_pass(&self, report: &mut SyncReport) -> Result<(), StorageError> {
        self.replay_queue(report).await?;
        self.emit(SyncEvent::Progress(50));

        let fetches =
            fetch_collections(self.remote.as_ref(), &self.endpoints, self.fetch_timeout).await;
        report.refreshed = persist_collections(&self.store, &fetches).await?;
        self.emit(SyncEvent::Progress(90));

        Ok(())
    }

    async fn replay_queue(&self, report: &mut SyncReport) -> Result<(), StorageError> {
        let mut pending: VecDeque<QueuedOperation> = self.store.list_queue().await?.into();
        let total = pending.len();
        if total == 0 {
            return Ok(());
        }
        tracing::info!("Replaying {} queued operation(s)", total);

        let mut done = 0;
        while let Some(op) = pending.pop_front() {
            match self.send(&op).await {
                Ok(response) => {
                    let retarget = self.apply(&op, response).await?;
                    self.store.dequeue(op.id).await?;
                    report.replayed += 1;
                    tracing::info!("Synced {} {}", op.kind, op.url);

                    if let Some((temporary_id, server_id)) = retarget {
                        if self.store.retarget_queue(&temporary_id, &server_id).await? > 0 {
                            pending = self.reload(&pending).await?;
                        }
                    }
                    self.emit(SyncEvent::OperationSynced(op));
                }
                Err(e) => {
                    report.failed += 1;
                    let retries = self
                        .store
                        .increment_retries(op.id)
                        .await?
                        .unwrap_or(op.retries + 1);

                    if retries > MAX_RETRIES {
                        tracing::warn!(
                            "Abandoning {} {} after {} failed attempts: {}",
                            op.kind,
                            op.url,
                            retries,
                            e
                        );
                        self.store.dequeue(op.id).await?;
                        report.abandoned += 1;
                        self.emit(SyncEvent::OperationAbandoned(QueuedOperation { retries, ..op }));
                    } else {
                        tracing::warn!(
                            "Failed to sync {} {} (attempt {}): {}",
                            op.kind,
                            op.url,
                            retries,
                            e
                        );
                    }
                }
            }

            done += 1;
            if done < total {
                self.emit(SyncEvent::Progress((10 + done * 40 / total) as u8));
            }
        }

        Ok(())
    }

    async fn send(&self, op: &QueuedOperation) -> Result<Value, RemoteError> {
        let empty = Value::Object(Map::new());
        let body = op.payload.as_ref().unwrap_or(&empty);

        match op.kind {
            OperationKind::Create => self.remote.post(&op.url, body).await,
            OperationKind::Update => self.remote.put(&op.url, body).await,
            OperationKind::Delete => self.remote.delete(&op.url).await.map(|()| Value::Null),
        }
    }

    /// Applies a confirmed operation to the local store. For a CREATE that
    /// got a keyed answer, returns `(temporary id, server id)`.
    async fn apply(
        &self,
        op: &QueuedOperation,
        response: Value,
    ) -> Result<Option<(String, String)>, StorageError> {
        let confirmed = Record::from_value(response).filter(|r| r.id().is_some());

        match op.kind {
            OperationKind::Create => {
                if let Some(temporary_id) = &op.temporary_id {
                    self.store.delete(op.entity, temporary_id).await?;
                }
                let Some(record) = confirmed else {
                    return Ok(None);
                };
                self.store.put(op.entity, &record).await?;
                Ok(op
                    .temporary_id
                    .clone()
                    .zip(record.id().map(str::to_string)))
            }
            OperationKind::Update => {
                if let Some(record) = confirmed {
                    self.store.put(op.entity, &record).await?;
                }
                Ok(None)
            }
            OperationKind::Delete => {
                if let Some(id) = &op.record_id {
                    self.store.delete(op.entity, id).await?;
                }
                Ok(None)
            }
        }
    }

    /// Re-reads the still-pending entries after the queue was rewritten.
    async fn reload(
        &self,
        pending: &VecDeque<QueuedOperation>,
    ) -> Result<VecDeque<QueuedOperation>, StorageError> {
        let ids: HashSet<i64> = pending.iter().map(|op| op.id).collect();
        Ok(self
            .store
            .list_queue()
            .await?
            .into_iter()
            .filter(|op| ids.contains(&op.id))
            .collect())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
