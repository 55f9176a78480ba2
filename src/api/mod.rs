//! Local HTTP API.
//!
//! # Routes
//! ```text
//! GET  /healthcheck    liveness and version
//! POST /stop           request process shutdown
//! GET  /state          aggregated node state
//! GET  /location       current location (cached)
//! GET  /services       running services
//! POST /services       start a service, mapping its port if it declares one
//! DELETE /services/{id}  stop a service
//! POST /nat/ping       open a path to a consumer through the local NAT
//! GET  /debug/metrics  Prometheus text, only when profiling is enabled
//! ```

pub mod handlers;
pub mod server;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::lifecycle::Shutdown;
use crate::location::LocationCache;
use crate::nat::NatService;
use crate::services::ServicesManager;
use crate::state::StateKeeper;

pub use server::{api_server_for, ApiServer, HttpApiServer, NoopApiServer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct ApiState {
    pub state_keeper: Arc<StateKeeper>,
    pub location: Arc<LocationCache>,
    pub services: Arc<ServicesManager>,
    pub nat: Arc<NatService>,
    pub shutdown: Arc<Shutdown>,
    pub prometheus: Option<PrometheusHandle>,
    pub started_at: Instant,
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn router(state: ApiState) -> Router {
    let mut router = Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/stop", post(handlers::stop))
        .route("/state", get(handlers::get_state))
        .route("/location", get(handlers::get_location))
        .route(
            "/services",
            get(handlers::list_services).post(handlers::start_service),
        )
        .route("/services/{id}", delete(handlers::stop_service))
        .route("/nat/ping", post(handlers::ping_peer));

    if state.prometheus.is_some() {
        router = router.route("/debug/metrics", get(handlers::get_metrics));
    }

    router
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}
