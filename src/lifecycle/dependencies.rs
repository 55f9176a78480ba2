//! The dependency aggregate.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::blockchain::ChainClient;
use crate::config::NetworkDefinition;
use crate::discovery::{DiscoveryWorker, ProposalRepository};
use crate::eventbus::EventBus;
use crate::firewall::{IncomingFirewall, OutgoingFirewall};
use crate::identity::IdentityManager;
use crate::lifecycle::node::Node;
use crate::lifecycle::reconnect::ReconnectWatcher;
use crate::lifecycle::{Shutdown, Stage};
use crate::location::LocationCache;
use crate::nat::{GatewayLoader, NatService, NatStatusTracker, NatTracker};
use crate::net::{BrokerConnection, BrokerConnector, HttpClient};
use crate::payments::BalanceTracker;
use crate::services::ServicesManager;
use crate::state::StateKeeper;
use crate::storage::{JsonStore, SessionStorage};
use crate::telemetry::{NatEventSender, QualityClient, TelemetryBridge};

pub(crate) const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Every handle the node owns.
///
/// A handle is `Some` exactly when the stage that builds it has committed and
/// shutdown has not taken it back. The caller owns the aggregate and drives
/// it through [`Dependencies::bootstrap`] and [`Dependencies::shutdown`].
#[derive(Default)]
pub struct Dependencies {
    pub api_listener: Option<TcpListener>,

    pub outgoing_firewall: Option<Arc<OutgoingFirewall>>,
    pub incoming_firewall: Option<Arc<dyn IncomingFirewall>>,

    pub event_bus: Option<EventBus>,

    pub storage: Option<Arc<JsonStore>>,
    pub session_storage: Option<Arc<SessionStorage>>,

    pub network: Option<NetworkDefinition>,
    pub http_client: Option<Arc<HttpClient>>,
    pub broker_connector: Option<Arc<BrokerConnector>>,
    pub broker_connection: Option<Arc<BrokerConnection>>,
    pub chain_client: Option<Arc<ChainClient>>,

    pub identity_manager: Option<IdentityManager>,
    pub identity: Option<Address>,

    pub balance_tracker: Option<Arc<BalanceTracker>>,

    pub proposal_repository: Option<Arc<ProposalRepository>>,
    pub discovery_worker: Option<Arc<DiscoveryWorker>>,

    pub location_cache: Option<Arc<LocationCache>>,

    pub gateway_loader: Option<Arc<GatewayLoader>>,
    pub nat_tracker: Option<Arc<NatTracker>>,
    pub nat_status_tracker: Option<Arc<NatStatusTracker>>,
    pub nat_service: Option<Arc<NatService>>,

    pub services_manager: Option<Arc<ServicesManager>>,

    pub quality_client: Option<Arc<QualityClient>>,
    pub telemetry_bridge: Option<Arc<TelemetryBridge>>,
    pub nat_event_sender: Option<Arc<NatEventSender>>,

    pub state_keeper: Option<Arc<StateKeeper>>,

    pub prometheus: Option<PrometheusHandle>,
    pub node: Option<Node>,

    pub reconnect_watcher: Option<Arc<ReconnectWatcher>>,

    /// Process stop requests (signals, API).
    pub shutdown_signal: Arc<Shutdown>,

    /// Bound for each teardown step; set from the options by bootstrap.
    pub(crate) step_timeout: Option<Duration>,
    pub(crate) stages_completed: Vec<Stage>,
}

impl Dependencies {
    /// An empty aggregate. Nothing is acquired until `bootstrap` runs.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn teardown_step_timeout(&self) -> Duration {
        self.step_timeout.unwrap_or(DEFAULT_STEP_TIMEOUT)
    }

    /// Stages committed by the last bootstrap, in order.
    pub fn stages_completed(&self) -> &[Stage] {
        &self.stages_completed
    }

    /// Whether any handle is still held.
    pub fn is_empty(&self) -> bool {
        self.api_listener.is_none()
            && self.outgoing_firewall.is_none()
            && self.incoming_firewall.is_none()
            && self.event_bus.is_none()
            && self.storage.is_none()
            && self.session_storage.is_none()
            && self.network.is_none()
            && self.http_client.is_none()
            && self.broker_connector.is_none()
            && self.broker_connection.is_none()
            && self.chain_client.is_none()
            && self.identity_manager.is_none()
            && self.identity.is_none()
            && self.balance_tracker.is_none()
            && self.proposal_repository.is_none()
            && self.discovery_worker.is_none()
            && self.location_cache.is_none()
            && self.gateway_loader.is_none()
            && self.nat_tracker.is_none()
            && self.nat_status_tracker.is_none()
            && self.nat_service.is_none()
            && self.services_manager.is_none()
            && self.quality_client.is_none()
            && self.telemetry_bridge.is_none()
            && self.nat_event_sender.is_none()
            && self.state_keeper.is_none()
            && self.prometheus.is_none()
            && self.node.is_none()
            && self.reconnect_watcher.is_none()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("stages_completed", &self.stages_completed)
            .field("identity", &self.identity)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
