//! The remote shop API as seen by the data layer.
//!
//! The server is an opaque collaborator: JSON in, JSON out, success or
//! failure. [`HttpRemote`] talks to it over HTTP; tests substitute their own
//! implementation.

mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub use http::HttpRemote;

/// Any failure talking to the server. Callers in this crate treat every
/// variant the same way (fall back to cache or queue); the distinction is
/// kept for logging.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// REST verbs against resource URLs.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn get(&self, url: &str) -> Result<Value, RemoteError>;

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RemoteError>;

    async fn put(&self, url: &str, body: &Value) -> Result<Value, RemoteError>;

    async fn delete(&self, url: &str) -> Result<(), RemoteError>;
}

/// Runs a GET bounded by `limit`. A timeout counts as a failure.
pub async fn get_with_timeout(
    remote: &dyn RemoteApi,
    url: &str,
    limit: Duration,
) -> Result<Value, RemoteError> {
    match tokio::time::timeout(limit, remote.get(url)).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout(limit)),
    }
}
