//! Ordered bootstrap.
//!
//! # Stage order
//! ```text
//! options            semantic validation, nothing acquired
//! api-listener       bind the API port (fail-fast, nothing else allocated yet)
//! directories        create and probe data/storage/keystore/config/runtime
//! firewall           outgoing default-deny + incoming service firewall
//! event-bus
//! storage            open, migrate, session history subscription
//! network            definition, firewall exceptions, HTTP/broker/chain clients
//! identity           keystore, first identity
//! settlement         balance tracker (chain + identity)
//! discovery          proposal repository and worker (started in `start`)
//! location           resolver strategy, cache
//! nat                gateway warm-up, trackers, pinger and mapper strategies
//! services           services manager, ports mapped through the NAT service
//! quality            quality client, transport strategy, telemetry bridge
//! state-keeper       read model over nat/services/identity/settlement
//! node               API server (or no-op) on the pre-bound listener
//! reconnect-watcher  fan-out over every network-bound client
//! start              node start, discovery start
//! ```
//!
//! The first failing stage aborts the run. Nothing is rolled back here;
//! committed handles stay in the aggregate until `shutdown` releases them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::{api_server_for, ApiState};
use crate::blockchain::ChainClient;
use crate::config::validation::validate_options;
use crate::config::{LocationProvider, NetworkDefinition, NodeOptions};
use crate::discovery::{DiscoveryWorker, ProposalRepository};
use crate::eventbus::EventBus;
use crate::events::ConnectionState;
use crate::firewall::{incoming_firewall, OutgoingFirewall};
use crate::identity::{IdentityManager, Keystore};
use crate::lifecycle::dependencies::Dependencies;
use crate::lifecycle::directories::prepare_directories;
use crate::lifecycle::node::Node;
use crate::lifecycle::reconnect::ReconnectWatcher;
use crate::lifecycle::{BootstrapError, Stage, StageError};
use crate::location::{resolver_for, LocationCache, LocationError};
use crate::nat::{mapper_for, pinger_for, GatewayLoader, NatService, NatStatusTracker, NatTracker};
use crate::net::http_client::DEFAULT_TIMEOUT;
use crate::net::{acquire_api_listener, BrokerConnector, HttpClient, Reconnectable};
use crate::observability::metrics;
use crate::payments::BalanceTracker;
use crate::services::ServicesManager;
use crate::state::StateKeeper;
use crate::storage::{JsonStore, SessionStorage, HISTORY};
use crate::telemetry::{transport_for, AppInfo, NatEventSender, QualityClient, TelemetryBridge};

/// Handle a stage needs from an earlier one.
fn required<'a, T>(handle: &'a Option<T>, name: &'static str) -> Result<&'a T, StageError> {
    handle
        .as_ref()
        .ok_or_else(|| StageError::Configuration(format!("{} has not been initialised", name)))
}

/// Options built in code skip the loader, so they are checked again here.
fn validate(options: &NodeOptions) -> Result<(), StageError> {
    validate_options(options).map_err(|errors| {
        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        StageError::Configuration(reasons.join(", "))
    })
}

impl Dependencies {
    /// Run every stage in order, stopping at the first failure.
    pub async fn bootstrap(&mut self, options: &NodeOptions) -> Result<(), BootstrapError> {
        // A zero bound is rejected by the options stage; keep the default for teardown.
        self.step_timeout = Some(Duration::from_secs(options.shutdown.step_timeout_secs))
            .filter(|timeout| !timeout.is_zero());
        self.stages_completed.clear();

        let started = Instant::now();
        for stage in Stage::ALL {
            let result = self.run_stage(stage, options).await;
            self.commit(stage, result)?;
        }

        tracing::info!(
            elapsed = ?started.elapsed(),
            stages = self.stages_completed.len(),
            "Bootstrap complete"
        );
        Ok(())
    }

    fn commit(
        &mut self,
        stage: Stage,
        result: Result<(), StageError>,
    ) -> Result<(), BootstrapError> {
        match result {
            Ok(()) => {
                tracing::debug!(stage = %stage, "Bootstrap stage committed");
                metrics::record_stage_committed(stage.as_str());
                self.stages_completed.push(stage);
                Ok(())
            }
            Err(source) => {
                tracing::error!(stage = %stage, error = %source, "Bootstrap stage failed");
                Err(BootstrapError { stage, source })
            }
        }
    }

    async fn run_stage(&mut self, stage: Stage, options: &NodeOptions) -> Result<(), StageError> {
        match stage {
            Stage::Options => validate(options),
            Stage::ApiListener => self.bootstrap_api_listener(options).await,
            Stage::Directories => prepare_directories(&options.directories),
            Stage::Firewall => self.bootstrap_firewall(options),
            Stage::EventBus => {
                self.event_bus = Some(EventBus::new());
                Ok(())
            }
            Stage::Storage => self.bootstrap_storage(options),
            Stage::Network => self.bootstrap_network(options),
            Stage::Identity => self.bootstrap_identity(options),
            Stage::Settlement => self.bootstrap_settlement(),
            Stage::Discovery => self.bootstrap_discovery(options),
            Stage::Location => self.bootstrap_location(options),
            Stage::Nat => self.bootstrap_nat(options),
            Stage::Services => {
                let bus = required(&self.event_bus, "event bus")?;
                let nat = required(&self.nat_service, "nat service")?;
                let manager = ServicesManager::new(bus.clone(), nat.clone());
                self.services_manager = Some(Arc::new(manager));
                Ok(())
            }
            Stage::Quality => self.bootstrap_quality(options),
            Stage::StateKeeper => self.bootstrap_state_keeper(),
            Stage::Node => self.bootstrap_node(options),
            Stage::ReconnectWatcher => self.bootstrap_reconnect_watcher(),
            Stage::Start => self.bootstrap_start(),
        }
    }

    async fn bootstrap_api_listener(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        self.api_listener = acquire_api_listener(&options.api)
            .await
            .map_err(|e| StageError::resource("api listener", e))?;
        Ok(())
    }

    fn bootstrap_firewall(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let outgoing = Arc::new(OutgoingFirewall::new());
        outgoing
            .setup()
            .map_err(|e| StageError::resource("outgoing firewall", e))?;
        // Held from here on so shutdown can reset it if the incoming side fails.
        self.outgoing_firewall = Some(outgoing);

        let incoming = incoming_firewall(options.firewall.incoming_enabled);
        incoming
            .setup()
            .map_err(|e| StageError::resource("incoming firewall", e))?;
        self.incoming_firewall = Some(incoming);
        Ok(())
    }

    fn bootstrap_storage(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;

        let store = JsonStore::open(&options.directories.storage)
            .map_err(|e| StageError::resource("storage", e))?;
        let applied = store
            .run_migrations(HISTORY)
            .map_err(|e| StageError::resource("storage", e))?;
        tracing::info!(path = %store.path().display(), migrations = applied, "Storage ready");

        let store = Arc::new(store);
        let sessions = Arc::new(SessionStorage::new(store.clone()));
        sessions.subscribe(bus)?;

        self.storage = Some(store);
        self.session_storage = Some(sessions);
        Ok(())
    }

    fn bootstrap_network(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let firewall = required(&self.outgoing_firewall, "outgoing firewall")?;
        let network = NetworkDefinition::resolve(&options.network);

        let mut endpoints = network.endpoints();
        endpoints.push(options.location.ip_detector_url.as_str());
        if options.location.provider == LocationProvider::Oracle {
            endpoints.push(options.location.address.as_str());
        }
        firewall
            .allow_url_access(&endpoints)
            .map_err(StageError::configuration)?;

        let http = HttpClient::new(DEFAULT_TIMEOUT, firewall.clone())
            .map_err(|e| StageError::resource("http client", e))?;

        let broker_connector = Arc::new(BrokerConnector::new());
        let broker_connection = broker_connector
            .connect(&network.broker_address)
            .map_err(StageError::configuration)?;

        let chain = ChainClient::new(
            &network.ether_client_rpc,
            network.chain_id,
            options.network.rpc_timeout_secs,
        )
        .map_err(StageError::configuration)?;

        tracing::info!(
            api = %network.api_address,
            broker = %network.broker_address,
            chain_id = network.chain_id,
            "Network configured"
        );

        self.http_client = Some(Arc::new(http));
        self.broker_connector = Some(broker_connector);
        self.broker_connection = Some(broker_connection);
        self.chain_client = Some(Arc::new(chain));
        self.network = Some(network);
        Ok(())
    }

    fn bootstrap_identity(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let keystore = Keystore::open(&options.directories.keystore)
            .map_err(|e| StageError::resource("keystore", e))?;
        let manager = IdentityManager::new(Arc::new(keystore));
        let identity = manager
            .get_or_create_identity()
            .map_err(|e| StageError::resource("identity", e))?;

        tracing::info!(identity = %identity, "Identity unlocked");
        self.identity_manager = Some(manager);
        self.identity = Some(identity);
        Ok(())
    }

    fn bootstrap_settlement(&mut self) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let chain = required(&self.chain_client, "chain client")?;
        let identity = *required(&self.identity, "identity")?;

        let tracker = Arc::new(BalanceTracker::new(chain.clone(), identity));
        tracker.subscribe(bus)?;
        self.balance_tracker = Some(tracker);
        Ok(())
    }

    fn bootstrap_discovery(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let http = required(&self.http_client, "http client")?;
        let network = required(&self.network, "network definition")?;

        let repository = Arc::new(ProposalRepository::new());
        let worker = Arc::new(DiscoveryWorker::new(
            http.clone(),
            &network.api_address,
            repository.clone(),
            bus.clone(),
            Duration::from_secs(options.discovery.interval_secs),
        ));

        self.proposal_repository = Some(repository);
        self.discovery_worker = Some(worker);
        Ok(())
    }

    fn bootstrap_location(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let http = required(&self.http_client, "http client")?;

        let resolver = resolver_for(&options.location, &options.directories.config, http.clone())
            .map_err(|e| match e {
                LocationError::Database { .. } => StageError::resource("location database", e),
                other => StageError::configuration(other),
            })?;

        let cache = Arc::new(LocationCache::new(
            resolver,
            Duration::from_secs(options.location.cache_ttl_secs),
        ));
        cache.subscribe(bus)?;
        self.location_cache = Some(cache);
        Ok(())
    }

    fn bootstrap_nat(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;

        let loader = Arc::new(GatewayLoader::new());
        // Detached; a lookup before it finishes loads on the blocking pool.
        drop(loader.spawn_warm_up());

        let tracker = Arc::new(NatTracker::new());
        tracker.subscribe(bus)?;
        let status = Arc::new(NatStatusTracker::new());
        status.subscribe(bus)?;

        let pinger = pinger_for(options.experimental_nat_punching, bus.clone());
        let mapper = mapper_for(options.port_mapping_enabled, loader.clone(), bus.clone());
        tracing::info!(pinger = pinger.name(), mapper = mapper.name(), "NAT strategies selected");

        self.gateway_loader = Some(loader);
        self.nat_tracker = Some(tracker);
        self.nat_status_tracker = Some(status);
        self.nat_service = Some(Arc::new(NatService::new(pinger, mapper)));
        Ok(())
    }

    fn bootstrap_quality(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let firewall = required(&self.outgoing_firewall, "outgoing firewall")?;
        let network = required(&self.network, "network definition")?;
        let location = required(&self.location_cache, "location cache")?;
        let loader = required(&self.gateway_loader, "gateway loader")?;

        let http = Arc::new(
            HttpClient::new(Duration::from_secs(options.quality.timeout_secs), firewall.clone())
                .map_err(|e| StageError::resource("quality http client", e))?,
        );
        let client = Arc::new(QualityClient::new(http.clone(), &network.quality_address));
        client.start();

        let transport = transport_for(
            options.quality.transport,
            http,
            &network.quality_address,
            client.clone(),
        );
        let bridge = Arc::new(TelemetryBridge::new(
            transport,
            AppInfo::current(env!("CARGO_PKG_VERSION")),
            location.clone(),
        ));
        bridge.subscribe(bus)?;

        let nat_sender = Arc::new(NatEventSender::new(bridge.clone(), loader.clone()));
        nat_sender.subscribe(bus)?;

        self.quality_client = Some(client);
        self.telemetry_bridge = Some(bridge);
        self.nat_event_sender = Some(nat_sender);
        Ok(())
    }

    fn bootstrap_state_keeper(&mut self) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let nat = required(&self.nat_status_tracker, "nat status tracker")?;
        let services = required(&self.services_manager, "services manager")?;
        let identities = required(&self.identity_manager, "identity manager")?;
        let balances = required(&self.balance_tracker, "balance tracker")?;

        let keeper = Arc::new(StateKeeper::new(
            nat.clone(),
            services.clone(),
            identities.clone(),
            balances.clone(),
        ));
        keeper.subscribe(bus)?;
        self.state_keeper = Some(keeper);
        Ok(())
    }

    fn bootstrap_node(&mut self, options: &NodeOptions) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?.clone();
        let state_keeper = required(&self.state_keeper, "state keeper")?.clone();
        let location = required(&self.location_cache, "location cache")?.clone();
        let services = required(&self.services_manager, "services manager")?.clone();
        let nat = required(&self.nat_service, "nat service")?.clone();

        let prometheus = if options.profiling_enabled {
            metrics::install_prometheus()
        } else {
            None
        };

        let state = ApiState {
            state_keeper,
            location,
            services,
            nat,
            shutdown: self.shutdown_signal.clone(),
            prometheus: prometheus.clone(),
            started_at: Instant::now(),
        };
        let api = api_server_for(self.api_listener.take(), state)
            .map_err(|e| StageError::resource("api server", e))?;

        self.prometheus = prometheus;
        self.node = Some(Node::new(api, bus));
        Ok(())
    }

    fn bootstrap_reconnect_watcher(&mut self) -> Result<(), StageError> {
        let bus = required(&self.event_bus, "event bus")?;
        let http: Arc<dyn Reconnectable> = required(&self.http_client, "http client")?.clone();
        let quality: Arc<dyn Reconnectable> =
            required(&self.quality_client, "quality client")?.clone();
        let broker: Arc<dyn Reconnectable> =
            required(&self.broker_connector, "broker connector")?.clone();
        let chain: Arc<dyn Reconnectable> = required(&self.chain_client, "chain client")?.clone();
        let clients = vec![http, quality, broker, chain];

        // The node comes up offline.
        let watcher = Arc::new(ReconnectWatcher::starting_from(
            ConnectionState::NotConnected,
            clients,
        ));
        watcher.subscribe(bus)?;
        self.reconnect_watcher = Some(watcher);
        Ok(())
    }

    fn bootstrap_start(&mut self) -> Result<(), StageError> {
        let node = required(&self.node, "node")?;
        let worker = required(&self.discovery_worker, "discovery worker")?;

        node.start().map_err(|e| StageError::resource("node", e))?;
        worker.start();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_is_a_configuration_error() {
        let handle: Option<u8> = None;
        let err = required(&handle, "event bus").unwrap_err();
        assert!(matches!(err, StageError::Configuration(ref m) if m.contains("event bus")));
        assert_eq!(required(&Some(7u8), "value").unwrap(), &7);
    }

    #[tokio::test]
    async fn test_stages_run_in_order_until_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = NodeOptions::default();
        options.api.enabled = false;
        options.directories = crate::config::DirectoryOptions::under(dir.path());
        options.location.ip_detector_url = "not a url".to_string();

        let mut deps = Dependencies::new();
        let err = deps.bootstrap(&options).await.unwrap_err();

        assert_eq!(err.stage, Stage::Network);
        assert_eq!(deps.stages_completed(), &Stage::ALL[..6]);
        assert!(deps.http_client.is_none());
        deps.shutdown().await.unwrap();
    }
}
