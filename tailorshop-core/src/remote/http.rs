use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use super::{RemoteApi, RemoteError};

/// Default per-request timeout for interactive calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP implementation of [`RemoteApi`] on top of reqwest.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    api_token: Option<String>,
}

impl HttpRemote {
    pub fn new() -> Result<Self, RemoteError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        Ok(response)
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, RemoteError> {
        let response = self.send(builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn get(&self, url: &str) -> Result<Value, RemoteError> {
        tracing::debug!("GET {}", url);
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        tracing::debug!("POST {}", url);
        self.send_json(self.request(Method::POST, url).json(body))
            .await
    }

    async fn put(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        tracing::debug!("PUT {}", url);
        self.send_json(self.request(Method::PUT, url).json(body))
            .await
    }

    async fn delete(&self, url: &str) -> Result<(), RemoteError> {
        tracing::debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
