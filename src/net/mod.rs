//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap
//!     → listener.rs     bind the API port first (fail-fast precondition)
//!     → http_client.rs  shared HTTP client, firewall-checked
//!     → broker.rs       broker connector and its connections
//!
//! connectivity edge (reconnect watcher)
//!     → Reconnectable::reconnect() on every network-bound client
//! ```
//!
//! # Design Decisions
//! - Clients swap their inner transport atomically on reconnect; callers never see a gap
//! - Reconnect is idempotent and never blocks on the remote end

pub mod broker;
pub mod http_client;
pub mod listener;

use async_trait::async_trait;
use thiserror::Error;

pub use broker::{BrokerConnection, BrokerConnector, BrokerError};
pub use http_client::{HttpClient, HttpError};
pub use listener::{acquire_api_listener, ListenerError};

#[derive(Debug, Error)]
#[error("{client} failed to reconnect: {reason}")]
pub struct ReconnectError {
    pub client: &'static str,
    pub reason: String,
}

/// A network-bound client that can drop and re-establish its connections.
#[async_trait]
pub trait Reconnectable: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reconnect(&self) -> Result<(), ReconnectError>;
}
