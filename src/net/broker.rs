//! Message broker connector.
//!
//! The wire protocol is handled elsewhere; this keeps track of which broker
//! connections exist so they can be closed and re-dialled as a group.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::net::{ReconnectError, Reconnectable};

const DEFAULT_SCHEME: &str = "nats";
const DEFAULT_PORT: u16 = 4222;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("invalid broker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("broker connection to {0} is closed")]
    Closed(String),
}

/// Normalise a broker address: bare hosts get the default scheme and port.
pub fn parse_server_uri(address: &str) -> Result<Url, BrokerError> {
    let invalid = |reason: String| BrokerError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{address}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("no host".to_string()));
    }
    if url.port().is_none() {
        url.set_port(Some(DEFAULT_PORT))
            .map_err(|_| invalid("cannot set port".to_string()))?;
    }
    Ok(url)
}

/// A logical connection to one broker server.
#[derive(Debug)]
pub struct BrokerConnection {
    server: Url,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl BrokerConnection {
    pub fn server_url(&self) -> &Url {
        &self.server
    }

    /// Incremented each time the connection is re-dialled.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn redial(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed(self.server.to_string()));
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(server = %self.server, "Broker connection closed");
        }
    }
}

/// Hands out broker connections and re-dials them on demand.
#[derive(Debug, Default)]
pub struct BrokerConnector {
    connections: Mutex<Vec<Weak<BrokerConnection>>>,
}

impl BrokerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, address: &str) -> Result<Arc<BrokerConnection>, BrokerError> {
        let server = parse_server_uri(address)?;
        let connection = Arc::new(BrokerConnection {
            server,
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        connections.retain(|c| c.strong_count() > 0);
        connections.push(Arc::downgrade(&connection));

        tracing::info!(server = %connection.server, "Broker connection registered");
        Ok(connection)
    }

    /// Re-dial every live, open connection. Returns how many were re-dialled.
    pub fn reconnect_all(&self) -> usize {
        let live: Vec<_> = {
            let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
            connections.retain(|c| c.strong_count() > 0);
            connections.iter().filter_map(Weak::upgrade).collect()
        };

        live.iter().filter(|c| c.redial().is_ok()).count()
    }
}

#[async_trait]
impl Reconnectable for BrokerConnector {
    fn name(&self) -> &'static str {
        "broker-connector"
    }

    async fn reconnect(&self) -> Result<(), ReconnectError> {
        let count = self.reconnect_all();
        tracing::debug!(connections = count, "Broker connections re-dialled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_uri_defaults() {
        assert_eq!(
            parse_server_uri("broker.example").unwrap().as_str(),
            "nats://broker.example:4222"
        );
        assert_eq!(
            parse_server_uri("nats://10.0.0.1:4333").unwrap().port(),
            Some(4333)
        );
        assert!(parse_server_uri("nats://").is_err());
    }

    #[test]
    fn test_reconnect_all_skips_closed_and_dropped() {
        let connector = BrokerConnector::new();
        let open = connector.connect("nats://a.example").unwrap();
        let closed = connector.connect("nats://b.example").unwrap();
        let dropped = connector.connect("nats://c.example").unwrap();
        closed.close();
        drop(dropped);

        assert_eq!(connector.reconnect_all(), 1);
        assert_eq!(open.generation(), 1);
        assert_eq!(closed.generation(), 0);
    }
}
