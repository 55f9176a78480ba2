//! Exclusive API listener acquisition.
//!
//! # Responsibilities
//! - Bind the API port before anything else starts
//! - Report an occupied port as a distinct, early error

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ApiOptions;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The configured address does not parse.
    Address(String),
    /// Failed to bind to address.
    Bind { port: u16, source: std::io::Error },
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Address(address) => write!(f, "invalid API address: {}", address),
            ListenerError::Bind { port, source } => write!(
                f,
                "the port {} seems to be taken. Either you're already running a node or it is already used by another application: {}",
                port, source
            ),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Address(_) => None,
            ListenerError::Bind { source, .. } => Some(source),
        }
    }
}

/// Bind the API listener, or return `None` when the API is disabled.
pub async fn acquire_api_listener(
    options: &ApiOptions,
) -> Result<Option<TcpListener>, ListenerError> {
    if !options.enabled {
        tracing::info!("API disabled, no listener bound");
        return Ok(None);
    }

    let address = options.bind_address();
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| ListenerError::Address(address.clone()))?;

    let listener = TcpListener::bind(addr).await.map_err(|source| ListenerError::Bind {
        port: options.port,
        source,
    })?;

    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "API listener bound");
    }
    Ok(Some(listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(port: u16) -> ApiOptions {
        ApiOptions {
            enabled: true,
            address: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_disabled_api_binds_nothing() {
        let mut api = options(0);
        api.enabled = false;
        assert!(acquire_api_listener(&api).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_taken_port_is_reported() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = held.local_addr().unwrap().port();

        let err = acquire_api_listener(&options(port)).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
        assert!(err.to_string().contains("seems to be taken"));
    }
}
