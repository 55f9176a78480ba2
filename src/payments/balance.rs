//! Identity balance tracking.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use dashmap::DashMap;

use crate::blockchain::{ChainClient, ChainResult};
use crate::eventbus::{BusError, EventBus};
use crate::events::{NodeEvent, NodeStatus};

/// Last known on-chain balance per identity.
pub struct BalanceTracker {
    chain: Arc<ChainClient>,
    identity: Address,
    balances: DashMap<Address, U256>,
}

impl BalanceTracker {
    pub fn new(chain: Arc<ChainClient>, identity: Address) -> Self {
        Self {
            chain,
            identity,
            balances: DashMap::new(),
        }
    }

    /// Refresh the node identity's balance once the node has started.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Result<(), BusError> {
        let tracker = self.clone();
        bus.subscribe_async(move |event: NodeEvent| {
            let tracker = tracker.clone();
            async move {
                if event.status != NodeStatus::Started {
                    return;
                }
                if let Err(e) = tracker.refresh(tracker.identity).await {
                    tracing::warn!(
                        identity = %tracker.identity,
                        error = %e,
                        "Balance refresh failed"
                    );
                }
            }
        })
    }

    /// Query the chain and remember the result.
    pub async fn refresh(&self, address: Address) -> ChainResult<U256> {
        let balance = self.chain.get_balance(address).await?;
        self.balances.insert(address, balance);
        tracing::debug!(address = %address, balance = %balance, "Balance updated");
        Ok(balance)
    }

    pub fn balance(&self, address: &Address) -> Option<U256> {
        self.balances.get(address).map(|b| *b)
    }

    pub fn identity(&self) -> Address {
        self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_chain_leaves_balance_unknown() {
        let chain = Arc::new(ChainClient::new("http://127.0.0.1:1", 1, 1).unwrap());
        let tracker = BalanceTracker::new(chain, Address::ZERO);

        assert!(tracker.refresh(Address::ZERO).await.is_err());
        assert_eq!(tracker.balance(&Address::ZERO), None);
    }
}
