//! Shutdown coordination for the node.
//!
//! Two halves: [`Shutdown`] is the broadcast that tells the process to stop,
//! and [`Dependencies::shutdown`] releases the handles bootstrap committed.
//!
//! # Teardown phases
//! ```text
//! 1. stop accepting work      services manager
//! 2. close network resources  NAT service, discovery, broker, quality client
//! 3. policy                   incoming firewall, outgoing firewall
//! 4. core runtime             node (API), event bus
//! 5. persistence              storage
//! ```
//! Every phase is attempted even when an earlier one failed.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::lifecycle::dependencies::Dependencies;
use crate::observability::metrics;
use crate::storage::PersistentStore;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A component that failed to release its resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeardownError {
    #[error("failed to tear down {component}: {reason}")]
    Component { component: &'static str, reason: String },

    #[error("tearing down {component} exceeded {timeout:?}")]
    Timeout {
        component: &'static str,
        timeout: Duration,
    },
}

impl TeardownError {
    pub fn component(&self) -> &'static str {
        match self {
            TeardownError::Component { component, .. }
            | TeardownError::Timeout { component, .. } => component,
        }
    }
}

/// Runs bounded teardown steps and keeps every failure.
struct Teardown {
    step_timeout: Duration,
    errors: Vec<TeardownError>,
}

impl Teardown {
    fn new(step_timeout: Duration) -> Self {
        Self {
            step_timeout,
            errors: Vec::new(),
        }
    }

    async fn step<E, F>(&mut self, component: &'static str, release: F)
    where
        E: fmt::Display,
        F: Future<Output = Result<(), E>>,
    {
        let result = match tokio::time::timeout(self.step_timeout, release).await {
            Ok(Ok(())) => {
                tracing::debug!(component, "Released");
                return;
            }
            Ok(Err(e)) => TeardownError::Component {
                component,
                reason: e.to_string(),
            },
            Err(_) => TeardownError::Timeout {
                component,
                timeout: self.step_timeout,
            },
        };

        tracing::error!(component, error = %result, "Teardown step failed");
        metrics::record_teardown_failure(component);
        self.errors.push(result);
    }

    fn finish(self) -> Result<(), TeardownError> {
        if self.errors.len() > 1 {
            tracing::warn!(failures = self.errors.len(), "Teardown finished with several failures");
        }
        match self.errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

fn infallible(_: ()) -> Result<(), std::convert::Infallible> {
    Ok(())
}

impl Dependencies {
    /// Release every handle still held.
    ///
    /// Safe on an empty aggregate and safe to call repeatedly: a handle is
    /// taken out before it is released, so a second call finds nothing to do.
    /// Returns the first failure after every phase has been attempted.
    pub async fn shutdown(&mut self) -> Result<(), TeardownError> {
        let mut teardown = Teardown::new(self.teardown_step_timeout());

        // Phase 1: stop accepting work.
        if let Some(services) = self.services_manager.take() {
            teardown
                .step("services-manager", async move { services.kill().await })
                .await;
        }

        // Phase 2: network-facing resources.
        if let Some(nat) = self.nat_service.take() {
            teardown.step("nat-service", async move { nat.disable().await }).await;
        }
        if let Some(worker) = self.discovery_worker.take() {
            teardown
                .step("discovery-worker", async move { infallible(worker.stop().await) })
                .await;
        }
        if let Some(connection) = self.broker_connection.take() {
            teardown
                .step("broker-connection", async move { infallible(connection.close()) })
                .await;
        }
        if let Some(client) = self.quality_client.take() {
            teardown
                .step("quality-client", async move { infallible(client.stop()) })
                .await;
        }

        // Phase 3: firewall rules.
        if let Some(incoming) = self.incoming_firewall.take() {
            teardown
                .step("incoming-firewall", async move { infallible(incoming.teardown()) })
                .await;
        }
        if let Some(outgoing) = self.outgoing_firewall.take() {
            teardown
                .step("outgoing-firewall", async move { infallible(outgoing.reset()) })
                .await;
        }

        // Phase 4: core runtime. The node publishes its stop before the bus closes.
        if let Some(node) = self.node.take() {
            teardown.step("node", async move { node.kill().await }).await;
        }
        if let Some(bus) = self.event_bus.take() {
            teardown
                .step("event-bus", async move { infallible(bus.close()) })
                .await;
        }

        // Phase 5: storage last, so everything above could still write.
        self.session_storage = None;
        if let Some(storage) = self.storage.take() {
            teardown.step("storage", async move { storage.close() }).await;
        }

        self.release_remaining();
        teardown.finish()
    }

    /// Drop handles that own nothing needing an explicit release.
    fn release_remaining(&mut self) {
        if let Some(listener) = self.api_listener.take() {
            tracing::debug!(addr = ?listener.local_addr().ok(), "Releasing unused API listener");
        }
        self.network = None;
        self.http_client = None;
        self.broker_connector = None;
        self.chain_client = None;
        self.identity_manager = None;
        self.identity = None;
        self.balance_tracker = None;
        self.proposal_repository = None;
        self.location_cache = None;
        self.gateway_loader = None;
        self.nat_tracker = None;
        self.nat_status_tracker = None;
        self.telemetry_bridge = None;
        self.nat_event_sender = None;
        self.state_keeper = None;
        self.prometheus = None;
        self.reconnect_watcher = None;
    }
}
