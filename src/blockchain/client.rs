//! Blockchain RPC client with timeout and reconnect support.
//!
//! # Responsibilities
//! - Connect to the JSON-RPC endpoint of the configured network
//! - Query chain state (chain id, block number, balances)
//! - Handle timeouts and network errors gracefully
//! - Replace the provider when connectivity changes

use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::blockchain::types::{ChainError, ChainId, ChainResult};
use crate::net::{ReconnectError, Reconnectable};

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Blockchain RPC client wrapper.
pub struct ChainClient {
    provider: ArcSwap<DynProvider>,
    rpc_url: url::Url,
    chain_id: u64,
    timeout_duration: Duration,
    generation: AtomicU64,
}

impl ChainClient {
    /// Create a new client. No request is made until the first query.
    pub fn new(rpc_url: &str, chain_id: u64, timeout_secs: u64) -> ChainResult<Self> {
        let url: url::Url = rpc_url.parse().map_err(|e: url::ParseError| ChainError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(rpc_url = %url, chain_id, "Blockchain client initialized");

        Ok(Self {
            provider: ArcSwap::from_pointee(connect(&url)),
            rpc_url: url,
            chain_id,
            timeout_duration: Duration::from_secs(timeout_secs),
            generation: AtomicU64::new(0),
        })
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> ChainResult<ChainId> {
        let provider = self.provider.load_full();
        self.call(provider.get_chain_id()).await.map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        let provider = self.provider.load_full();
        self.call(provider.get_block_number()).await
    }

    /// Get the balance of an address.
    pub async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        let provider = self.provider.load_full();
        self.call(provider.get_balance(address).into_future()).await
    }

    /// Check if the blockchain is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.get_block_number().await.is_ok()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &url::Url {
        &self.rpc_url
    }

    /// How many times the provider has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn call<T, E, F>(&self, fut: F) -> ChainResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                tracing::warn!(rpc_url = %self.rpc_url, error = %e, "RPC error");
                Err(ChainError::Rpc(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(rpc_url = %self.rpc_url, "RPC timeout");
                Err(ChainError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

#[async_trait]
impl Reconnectable for ChainClient {
    fn name(&self) -> &'static str {
        "chain-client"
    }

    async fn reconnect(&self) -> Result<(), ReconnectError> {
        self.provider.store(Arc::new(connect(&self.rpc_url)));
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(rpc_url = %self.rpc_url, "Blockchain provider replaced");
        Ok(())
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("chain_id", &self.chain_id)
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}

fn connect(url: &url::Url) -> DynProvider {
    Arc::new(ProviderBuilder::new().connect_http(url.clone()))
}
