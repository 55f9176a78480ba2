//! Options schema definitions.
//!
//! This module defines the complete option structure for the node.
//! All types derive Serde traits for deserialization from option files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root options for the node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeOptions {
    /// Local HTTP API.
    pub api: ApiOptions,

    /// Directories the node reads and writes.
    pub directories: DirectoryOptions,

    /// Firewall behaviour.
    pub firewall: FirewallOptions,

    /// Request port mappings from the local gateway.
    pub port_mapping_enabled: bool,

    /// Use the hole-punching NAT pinger instead of the no-op one.
    pub experimental_nat_punching: bool,

    /// Expose runtime metrics on the API.
    pub profiling_enabled: bool,

    /// Network preset and per-field overrides.
    pub network: NetworkOptions,

    /// Quality oracle telemetry.
    pub quality: QualityOptions,

    /// Location resolution.
    pub location: LocationOptions,

    /// Proposal discovery.
    pub discovery: DiscoveryOptions,

    /// Teardown behaviour.
    pub shutdown: ShutdownOptions,

    /// Logging settings.
    pub observability: ObservabilityOptions,
}

/// Local API options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiOptions {
    /// Serve the API at all. When false no listener is bound.
    pub enabled: bool,

    /// Address to bind (e.g., "127.0.0.1").
    pub address: String,

    /// Port to bind.
    pub port: u16,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1".to_string(),
            port: 4050,
        }
    }
}

impl ApiOptions {
    /// Socket address string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryOptions {
    pub data: PathBuf,
    pub storage: PathBuf,
    pub keystore: PathBuf,
    pub config: PathBuf,
    pub runtime: PathBuf,
}

impl DirectoryOptions {
    /// Standard layout below a single root directory.
    pub fn under(root: &Path) -> Self {
        Self {
            data: root.to_path_buf(),
            storage: root.join("db"),
            keystore: root.join("keystore"),
            config: root.join("config"),
            runtime: root.join("run"),
        }
    }

    /// All directories in a fixed order.
    pub fn all(&self) -> [&Path; 5] {
        [
            &self.data,
            &self.storage,
            &self.keystore,
            &self.config,
            &self.runtime,
        ]
    }
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self::under(Path::new(".relay-node"))
    }
}

/// Firewall options.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FirewallOptions {
    /// Enforce the incoming service firewall.
    pub incoming_enabled: bool,
}

/// Named network presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPreset {
    #[default]
    Default,
    Testnet,
    Localnet,
}

/// Network options. Every `Some` field overrides the preset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub preset: NetworkPreset,
    pub api_address: Option<String>,
    pub broker_address: Option<String>,
    pub ether_client_rpc: Option<String>,
    pub quality_address: Option<String>,
    /// Chain RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            preset: NetworkPreset::Default,
            api_address: None,
            broker_address: None,
            ether_client_rpc: None,
            quality_address: None,
            rpc_timeout_secs: 10,
        }
    }
}

/// Quality telemetry transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityTransportKind {
    Elastic,
    #[default]
    Native,
    None,
}

/// Quality options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QualityOptions {
    pub transport: QualityTransportKind,
    /// Transport request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for QualityOptions {
    fn default() -> Self {
        Self {
            transport: QualityTransportKind::Native,
            timeout_secs: 10,
        }
    }
}

/// Location resolution providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    Manual,
    #[default]
    Builtin,
    #[serde(rename = "localdb")]
    LocalDb,
    Oracle,
}

/// Location options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationOptions {
    pub provider: LocationProvider,
    /// Oracle URL, or database file name relative to the config directory.
    pub address: String,
    pub country: String,
    pub city: String,
    pub node_type: String,
    /// Public IP detection endpoint.
    pub ip_detector_url: String,
    /// How long a resolved origin stays fresh.
    pub cache_ttl_secs: u64,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            provider: LocationProvider::Builtin,
            address: String::new(),
            country: String::new(),
            city: String::new(),
            node_type: String::new(),
            ip_detector_url: "https://api.ipify.org/?format=json".to_string(),
            cache_ttl_secs: 300,
        }
    }
}

/// Discovery options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryOptions {
    pub interval_secs: u64,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Shutdown options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownOptions {
    /// Upper bound for a single teardown step.
    pub step_timeout_secs: u64,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            step_timeout_secs: 10,
        }
    }
}

/// Observability options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityOptions {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityOptions {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Returned when a closed option enum is given an unknown name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub option: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.option, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! option_enum_names {
    ($ty:ty, $option:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(UnknownVariant { option: $option, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

option_enum_names!(NetworkPreset, "network preset", {
    "default" => NetworkPreset::Default,
    "testnet" => NetworkPreset::Testnet,
    "localnet" => NetworkPreset::Localnet,
});

option_enum_names!(QualityTransportKind, "quality transport", {
    "elastic" => QualityTransportKind::Elastic,
    "native" => QualityTransportKind::Native,
    "none" => QualityTransportKind::None,
});

option_enum_names!(LocationProvider, "location provider", {
    "manual" => LocationProvider::Manual,
    "builtin" => LocationProvider::Builtin,
    "localdb" => LocationProvider::LocalDb,
    "oracle" => LocationProvider::Oracle,
});
