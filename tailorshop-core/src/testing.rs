//! In-memory stand-in for the shop API, shared by the service tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::models::EntityKind;
use crate::remote::{RemoteApi, RemoteError};
use crate::route::Route;

pub const BASE_URL: &str = "http://shop.test";

#[derive(Default)]
struct FakeState {
    collections: HashMap<EntityKind, BTreeMap<String, Value>>,
    offline: bool,
    failing_urls: HashSet<String>,
    failing_kinds: HashSet<EntityKind>,
    calls: Vec<String>,
    next_id: u64,
}

struct Gate {
    verb: &'static str,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

/// Fake REST server keyed by the same routes as the real API.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
    gate: Mutex<Option<Gate>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, kind: EntityKind, records: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        let collection = state.collections.entry(kind).or_default();
        for record in records {
            let id = record["_id"].as_str().unwrap().to_string();
            collection.insert(id, record);
        }
    }

    pub fn records(&self, kind: EntityKind) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state
            .collections
            .get(&kind)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every request fails while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Requests to exactly this URL fail.
    pub fn fail_url(&self, url: &str) {
        self.state.lock().unwrap().failing_urls.insert(url.to_string());
    }

    /// Every request touching this collection fails.
    pub fn fail_kind(&self, kind: EntityKind) {
        self.state.lock().unwrap().failing_kinds.insert(kind);
    }

    /// Log of requests in arrival order, as `"<VERB> <url>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Makes the next GET block until released. Returns `(entered, release)`:
    /// `entered` is notified once the GET is parked, `release` lets it go.
    pub fn hold_next_get(&self) -> (Arc<Notify>, Arc<Notify>) {
        self.hold_next("GET")
    }

    /// Makes the next POST block after the server has stored the record,
    /// so the caller sees the response only once released.
    pub fn hold_next_post(&self) -> (Arc<Notify>, Arc<Notify>) {
        self.hold_next("POST")
    }

    fn hold_next(&self, verb: &'static str) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            verb,
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }

    async fn pause(&self, verb: &str) {
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            if slot.as_ref().is_some_and(|gate| gate.verb == verb) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn begin(&self, verb: &str, url: &str) -> Result<Route, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", verb, url));

        if state.offline || state.failing_urls.contains(url) {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        let route = Route::parse(url).map_err(|_| RemoteError::Status(404))?;
        if state.failing_kinds.contains(&route.kind) {
            return Err(RemoteError::Status(503));
        }
        Ok(route)
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn get(&self, url: &str) -> Result<Value, RemoteError> {
        self.pause("GET").await;

        let route = self.begin("GET", url)?;
        let state = self.state.lock().unwrap();
        let collection = state.collections.get(&route.kind);
        match route.id {
            Some(id) => collection
                .and_then(|c| c.get(&id))
                .cloned()
                .ok_or(RemoteError::Status(404)),
            None => Ok(Value::Array(
                collection
                    .map(|c| c.values().cloned().collect())
                    .unwrap_or_default(),
            )),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        let route = self.begin("POST", url)?;
        if route.id.is_some() {
            return Err(RemoteError::Status(405));
        }

        let record = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("srv_{}", state.next_id);

            let mut record = body.clone();
            record["_id"] = json!(id);
            state
                .collections
                .entry(route.kind)
                .or_default()
                .insert(id, record.clone());
            record
        };

        self.pause("POST").await;
        Ok(record)
    }

    async fn put(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        let route = self.begin("PUT", url)?;
        let id = route.id.ok_or(RemoteError::Status(405))?;

        let mut state = self.state.lock().unwrap();
        let collection = state.collections.entry(route.kind).or_default();
        if !collection.contains_key(&id) {
            return Err(RemoteError::Status(404));
        }

        let mut record = body.clone();
        record["_id"] = json!(id);
        collection.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, url: &str) -> Result<(), RemoteError> {
        let route = self.begin("DELETE", url)?;
        let id = route.id.ok_or(RemoteError::Status(405))?;

        let mut state = self.state.lock().unwrap();
        let removed = state
            .collections
            .get_mut(&route.kind)
            .and_then(|c| c.remove(&id));
        removed.map(|_| ()).ok_or(RemoteError::Status(404))
    }
}
