//! Quality oracle client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::net::{HttpClient, ReconnectError, Reconnectable};
use crate::telemetry::{Envelope, TransportError};

/// Submits telemetry to the quality oracle over its own connection pool.
pub struct QualityClient {
    http: Arc<HttpClient>,
    events_url: String,
    running: AtomicBool,
    submitted: AtomicU64,
}

impl QualityClient {
    pub fn new(http: Arc<HttpClient>, address: &str) -> Self {
        Self {
            http,
            events_url: format!("{}/events", address.trim_end_matches('/')),
            running: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            tracing::info!(url = %self.events_url, "Quality client started");
        }
    }

    /// Stop accepting events. Stopping twice is a no-op.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!(
                submitted = self.submitted.load(Ordering::SeqCst),
                "Quality client stopped"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        self.http.post_json(&self.events_url, envelope).await?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn events_url(&self) -> &str {
        &self.events_url
    }
}

#[async_trait]
impl Reconnectable for QualityClient {
    fn name(&self) -> &'static str {
        "quality-client"
    }

    async fn reconnect(&self) -> Result<(), ReconnectError> {
        self.http.reconnect().await.map_err(|e| ReconnectError {
            client: self.name(),
            reason: e.reason,
        })
    }
}

impl std::fmt::Debug for QualityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityClient")
            .field("events_url", &self.events_url)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::OutgoingFirewall;
    use crate::net::http_client::DEFAULT_TIMEOUT;
    use crate::telemetry::envelope::{AppInfo, EventContext, STARTUP};

    fn client() -> QualityClient {
        let http = HttpClient::new(DEFAULT_TIMEOUT, Arc::new(OutgoingFirewall::new())).unwrap();
        QualityClient::new(Arc::new(http), "http://127.0.0.1:1/api/v1/")
    }

    #[tokio::test]
    async fn test_submit_requires_start() {
        let client = client();
        assert_eq!(client.events_url(), "http://127.0.0.1:1/api/v1/events");

        let envelope = Envelope {
            application: AppInfo::current("test"),
            event_name: STARTUP,
            created_at: 0,
            context: EventContext::Startup("Started".to_string()),
        };
        assert!(matches!(client.submit(&envelope).await, Err(TransportError::NotRunning)));
    }

    #[tokio::test]
    async fn test_start_stop_and_reconnect() {
        let client = client();
        client.start();
        assert!(client.is_running());
        client.reconnect().await.unwrap();
        client.stop();
        client.stop();
        assert!(!client.is_running());
    }
}
