//! Network definitions and preset resolution.

use serde::Serialize;

use crate::config::schema::{NetworkOptions, NetworkPreset};

/// Endpoints the node talks to on a given network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDefinition {
    pub api_address: String,
    pub broker_address: String,
    pub ether_client_rpc: String,
    pub quality_address: String,
    pub chain_id: u64,
}

impl NetworkDefinition {
    pub fn mainnet() -> Self {
        Self {
            api_address: "https://discovery.relaynode.network/api/v1".to_string(),
            broker_address: "nats://broker.relaynode.network:4222".to_string(),
            ether_client_rpc: "https://rpc.relaynode.network".to_string(),
            quality_address: "https://quality.relaynode.network/api/v1".to_string(),
            chain_id: 137,
        }
    }

    pub fn testnet() -> Self {
        Self {
            api_address: "https://testnet-discovery.relaynode.network/api/v1".to_string(),
            broker_address: "nats://testnet-broker.relaynode.network:4222".to_string(),
            ether_client_rpc: "https://testnet-rpc.relaynode.network".to_string(),
            quality_address: "https://testnet-quality.relaynode.network/api/v1".to_string(),
            chain_id: 80002,
        }
    }

    pub fn localnet() -> Self {
        Self {
            api_address: "http://127.0.0.1:8001/v1".to_string(),
            broker_address: "nats://127.0.0.1:4222".to_string(),
            ether_client_rpc: "http://127.0.0.1:8545".to_string(),
            quality_address: "http://127.0.0.1:8085/api/v1".to_string(),
            chain_id: 31337,
        }
    }

    pub fn for_preset(preset: NetworkPreset) -> Self {
        match preset {
            NetworkPreset::Default => Self::mainnet(),
            NetworkPreset::Testnet => Self::testnet(),
            NetworkPreset::Localnet => Self::localnet(),
        }
    }

    /// Start from the preset and override every field set explicitly.
    pub fn resolve(options: &NetworkOptions) -> Self {
        let mut network = Self::for_preset(options.preset);

        if let Some(address) = &options.api_address {
            network.api_address = address.clone();
        }
        if let Some(address) = &options.broker_address {
            network.broker_address = address.clone();
        }
        if let Some(rpc) = &options.ether_client_rpc {
            network.ether_client_rpc = rpc.clone();
        }
        if let Some(address) = &options.quality_address {
            network.quality_address = address.clone();
        }

        network
    }

    /// Every remote endpoint, for firewall exceptions.
    pub fn endpoints(&self) -> Vec<&str> {
        vec![
            self.api_address.as_str(),
            self.broker_address.as_str(),
            self.ether_client_rpc.as_str(),
            self.quality_address.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_selection() {
        let options = NetworkOptions {
            preset: NetworkPreset::Localnet,
            ..Default::default()
        };
        assert_eq!(NetworkDefinition::resolve(&options), NetworkDefinition::localnet());
    }

    #[test]
    fn test_field_override_keeps_other_fields() {
        let options = NetworkOptions {
            preset: NetworkPreset::Testnet,
            broker_address: Some("nats://10.0.0.1:4222".to_string()),
            ..Default::default()
        };
        let network = NetworkDefinition::resolve(&options);
        assert_eq!(network.broker_address, "nats://10.0.0.1:4222");
        assert_eq!(network.api_address, NetworkDefinition::testnet().api_address);
        assert_eq!(network.chain_id, NetworkDefinition::testnet().chain_id);
    }
}
