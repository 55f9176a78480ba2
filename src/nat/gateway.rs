//! Default gateway discovery.

use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::task::JoinHandle;

const ROUTE_TABLE: &str = "/proc/net/route";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub interface: String,
    pub ip: Ipv4Addr,
}

impl Gateway {
    /// Flat description used in telemetry.
    pub fn descriptor(&self) -> HashMap<String, String> {
        HashMap::from([
            ("type".to_string(), "default".to_string()),
            ("ip".to_string(), self.ip.to_string()),
            ("interface".to_string(), self.interface.clone()),
        ])
    }
}

/// Lazily loaded list of default gateways.
#[derive(Debug)]
pub struct GatewayLoader {
    source: PathBuf,
    gateways: RwLock<Option<Vec<Gateway>>>,
}

impl Default for GatewayLoader {
    fn default() -> Self {
        Self::with_source(ROUTE_TABLE)
    }
}

impl GatewayLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read routes from `source` instead of the kernel route table.
    pub fn with_source(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            gateways: RwLock::new(None),
        }
    }

    /// Read the route table now and cache the result.
    pub fn load(&self) -> Vec<Gateway> {
        let gateways = match fs::read_to_string(&self.source) {
            Ok(content) => parse_routes(&content),
            Err(e) => {
                tracing::debug!(
                    source = %self.source.display(),
                    error = %e,
                    "Route table unavailable"
                );
                Vec::new()
            }
        };
        *self.gateways.write().unwrap_or_else(PoisonError::into_inner) = Some(gateways.clone());
        gateways
    }

    /// Load in the background. Nothing waits for the result.
    pub fn spawn_warm_up(self: &Arc<Self>) -> JoinHandle<()> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || {
            let gateways = loader.load();
            tracing::debug!(count = gateways.len(), "Gateways loaded");
        })
    }

    /// Cached gateways. A cold cache is filled on the blocking pool.
    pub async fn get(self: &Arc<Self>) -> Vec<Gateway> {
        if let Some(gateways) = self.cached() {
            return gateways;
        }
        let loader = self.clone();
        match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(gateways) => gateways,
            Err(e) => {
                tracing::warn!(error = %e, "Gateway load task failed");
                Vec::new()
            }
        }
    }

    pub async fn descriptors(self: &Arc<Self>) -> Vec<HashMap<String, String>> {
        self.get().await.iter().map(Gateway::descriptor).collect()
    }

    /// Gateways from the last load, if any finished.
    pub fn cached(&self) -> Option<Vec<Gateway>> {
        self.gateways.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Default routes from the text of `/proc/net/route`.
pub fn parse_routes(content: &str) -> Vec<Gateway> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields[1] != "00000000" {
                return None;
            }
            let raw = u32::from_str_radix(fields[2], 16).ok()?;
            if raw == 0 {
                return None;
            }
            Some(Gateway {
                interface: fields[0].to_string(),
                ip: Ipv4Addr::from(raw.to_le_bytes()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES: &str = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
        eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0\n\
        eth0\t0001A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0\n";

    #[test]
    fn test_parse_default_route() {
        let gateways = parse_routes(ROUTES);
        assert_eq!(
            gateways,
            vec![Gateway {
                interface: "eth0".to_string(),
                ip: Ipv4Addr::new(192, 168, 1, 1),
            }]
        );
        assert_eq!(gateways[0].descriptor()["ip"], "192.168.1.1");
    }

    #[tokio::test]
    async fn test_warm_up_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route");
        fs::write(&path, ROUTES).unwrap();

        let loader = Arc::new(GatewayLoader::with_source(&path));
        loader.spawn_warm_up().await.unwrap();

        fs::remove_file(&path).unwrap();
        assert_eq!(loader.get().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cold_cache_loads_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route");
        fs::write(&path, ROUTES).unwrap();

        let loader = Arc::new(GatewayLoader::with_source(&path));
        assert!(loader.cached().is_none());
        assert_eq!(loader.descriptors().await[0]["interface"], "eth0");
        assert_eq!(loader.cached().map(|g| g.len()), Some(1));
    }

    #[tokio::test]
    async fn test_missing_table_yields_no_gateways() {
        let loader = Arc::new(GatewayLoader::with_source("/nonexistent/route"));
        assert!(loader.descriptors().await.is_empty());
    }
}
