//! Shared outbound HTTP client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::firewall::OutgoingFirewall;
use crate::net::{ReconnectError, Reconnectable};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("outgoing firewall blocks {0}")]
    Blocked(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
}

/// HTTP client whose connection pool is replaced on reconnect.
pub struct HttpClient {
    inner: ArcSwap<reqwest::Client>,
    timeout: Duration,
    firewall: Arc<OutgoingFirewall>,
    generation: AtomicU64,
}

impl HttpClient {
    pub fn new(timeout: Duration, firewall: Arc<OutgoingFirewall>) -> Result<Self, HttpError> {
        Ok(Self {
            inner: ArcSwap::from_pointee(build_client(timeout)?),
            timeout,
            firewall,
            generation: AtomicU64::new(0),
        })
    }

    /// Current underlying client.
    pub fn client(&self) -> Arc<reqwest::Client> {
        self.inner.load_full()
    }

    /// How many times the pool has been rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.check(url)?;
        let response = self.client().get(url).send().await?;
        let response = ensure_success(url, response)?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(), HttpError> {
        self.check(url)?;
        let response = self.client().post(url).json(body).send().await?;
        ensure_success(url, response)?;
        Ok(())
    }

    fn check(&self, url: &str) -> Result<(), HttpError> {
        if self.firewall.is_allowed(url) {
            Ok(())
        } else {
            Err(HttpError::Blocked(url.to_string()))
        }
    }
}

#[async_trait]
impl Reconnectable for HttpClient {
    fn name(&self) -> &'static str {
        "http-client"
    }

    async fn reconnect(&self) -> Result<(), ReconnectError> {
        let client = build_client(self.timeout).map_err(|e| ReconnectError {
            client: self.name(),
            reason: e.to_string(),
        })?;
        self.inner.store(Arc::new(client));
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("HTTP client connection pool rebuilt");
        Ok(())
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.timeout)
            .field("generation", &self.generation())
            .finish()
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, HttpError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("relay-node/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn ensure_success(url: &str, response: reqwest::Response) -> Result<reqwest::Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reconnect_swaps_client() {
        let client = HttpClient::new(DEFAULT_TIMEOUT, Arc::new(OutgoingFirewall::new())).unwrap();
        let before = client.client();
        client.reconnect().await.unwrap();
        assert_eq!(client.generation(), 1);
        assert!(!Arc::ptr_eq(&before, &client.client()));
    }

    #[tokio::test]
    async fn test_blocked_by_firewall() {
        let firewall = Arc::new(OutgoingFirewall::new());
        firewall.setup().unwrap();
        let client = HttpClient::new(DEFAULT_TIMEOUT, firewall).unwrap();

        let err = client
            .get_json::<serde_json::Value>("http://127.0.0.1:9/blocked")
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Blocked(_)));
    }
}
