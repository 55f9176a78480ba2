//! Telemetry transports.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::QualityTransportKind;
use crate::net::HttpClient;
use crate::telemetry::{Envelope, QualityClient, TransportError};

#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_event(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

/// Build the transport named by `quality.transport`.
pub fn transport_for(
    kind: QualityTransportKind,
    http: Arc<HttpClient>,
    quality_address: &str,
    client: Arc<QualityClient>,
) -> Arc<dyn TelemetryTransport> {
    let transport: Arc<dyn TelemetryTransport> = match kind {
        QualityTransportKind::Elastic => Arc::new(ElasticTransport::new(http, quality_address)),
        QualityTransportKind::Native => Arc::new(NativeTransport::new(client)),
        QualityTransportKind::None => Arc::new(NoopTransport),
    };
    tracing::info!(transport = transport.name(), "Telemetry transport selected");
    transport
}

/// Posts envelopes as JSON documents to an Elasticsearch-style endpoint.
#[derive(Debug)]
pub struct ElasticTransport {
    http: Arc<HttpClient>,
    url: String,
}

impl ElasticTransport {
    pub fn new(http: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TelemetryTransport for ElasticTransport {
    fn name(&self) -> &'static str {
        "elastic"
    }

    async fn send_event(&self, envelope: &Envelope) -> Result<(), TransportError> {
        Ok(self.http.post_json(&self.url, envelope).await?)
    }
}

/// Sends through the quality oracle client.
#[derive(Debug)]
pub struct NativeTransport {
    client: Arc<QualityClient>,
}

impl NativeTransport {
    pub fn new(client: Arc<QualityClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TelemetryTransport for NativeTransport {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn send_event(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.client.submit(envelope).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

#[async_trait]
impl TelemetryTransport for NoopTransport {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn send_event(&self, _envelope: &Envelope) -> Result<(), TransportError> {
        Ok(())
    }
}
