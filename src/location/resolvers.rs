//! Location resolver strategies.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::location::{IpResolver, Location, LocationError, LocationResolver};
use crate::net::HttpClient;

/// Fixed location from the options file.
#[derive(Debug, Clone)]
pub struct ManualResolver {
    location: Location,
}

impl ManualResolver {
    pub fn new(location: Location) -> Self {
        Self { location }
    }
}

#[async_trait]
impl LocationResolver for ManualResolver {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn detect_location(&self) -> Result<Location, LocationError> {
        Ok(self.location.clone())
    }
}

/// Location as reported by the IP detector itself.
#[derive(Debug, Clone)]
pub struct BuiltinResolver {
    ip: IpResolver,
}

impl BuiltinResolver {
    pub fn new(ip: IpResolver) -> Self {
        Self { ip }
    }
}

#[async_trait]
impl LocationResolver for BuiltinResolver {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn detect_location(&self) -> Result<Location, LocationError> {
        self.ip.detect().await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DbEntry {
    country: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    node_type: String,
}

/// Offline lookup of the public IP in a JSON database file.
///
/// The file maps IP addresses to entries; a `"default"` key catches the rest.
#[derive(Debug)]
pub struct LocalDbResolver {
    ip: IpResolver,
    entries: HashMap<String, DbEntry>,
}

impl LocalDbResolver {
    pub const DEFAULT_KEY: &'static str = "default";

    pub fn open(path: &Path, ip: IpResolver) -> Result<Self, LocationError> {
        let database_error = |reason: String| LocationError::Database {
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| database_error(e.to_string()))?;
        let entries = serde_json::from_str(&content).map_err(|e| database_error(e.to_string()))?;
        Ok(Self { ip, entries })
    }

    pub fn lookup(&self, ip: &str) -> Result<Location, LocationError> {
        let entry = self
            .entries
            .get(ip)
            .or_else(|| self.entries.get(Self::DEFAULT_KEY))
            .ok_or_else(|| LocationError::NotFound(ip.to_string()))?;
        Ok(Location {
            ip: ip.to_string(),
            country: entry.country.clone(),
            city: entry.city.clone(),
            node_type: entry.node_type.clone(),
        })
    }
}

#[async_trait]
impl LocationResolver for LocalDbResolver {
    fn name(&self) -> &'static str {
        "localdb"
    }

    async fn detect_location(&self) -> Result<Location, LocationError> {
        let ip = self.ip.public_ip().await?;
        self.lookup(&ip)
    }
}

/// Remote location oracle returning a `Location` document.
#[derive(Debug, Clone)]
pub struct OracleResolver {
    http: Arc<HttpClient>,
    url: String,
}

impl OracleResolver {
    pub fn new(http: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LocationResolver for OracleResolver {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn detect_location(&self) -> Result<Location, LocationError> {
        Ok(self.http.get_json(&self.url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::OutgoingFirewall;
    use crate::net::http_client::DEFAULT_TIMEOUT;

    fn ip_resolver() -> IpResolver {
        let http = HttpClient::new(DEFAULT_TIMEOUT, Arc::new(OutgoingFirewall::new())).unwrap();
        IpResolver::new(Arc::new(http), "http://127.0.0.1:1/")
    }

    #[tokio::test]
    async fn test_manual_returns_configured_location() {
        let location = Location {
            country: "LT".to_string(),
            ..Default::default()
        };
        let resolver = ManualResolver::new(location.clone());
        assert_eq!(resolver.detect_location().await.unwrap(), location);
    }

    #[test]
    fn test_localdb_lookup_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(
            &path,
            r#"{"1.2.3.4": {"country": "DE", "city": "Berlin"}, "default": {"country": "US"}}"#,
        )
        .unwrap();

        let resolver = LocalDbResolver::open(&path, ip_resolver()).unwrap();
        assert_eq!(resolver.lookup("1.2.3.4").unwrap().city, "Berlin");
        assert_eq!(resolver.lookup("5.6.7.8").unwrap().country, "US");
    }

    #[test]
    fn test_localdb_missing_file() {
        let err =
            LocalDbResolver::open(Path::new("/nonexistent/db.json"), ip_resolver()).unwrap_err();
        assert!(matches!(err, LocationError::Database { .. }));
    }
}
