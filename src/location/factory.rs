//! Resolver selection.

use std::path::Path;
use std::sync::Arc;

use crate::config::{LocationOptions, LocationProvider};
use crate::location::resolvers::{BuiltinResolver, LocalDbResolver, ManualResolver, OracleResolver};
use crate::location::{IpResolver, Location, LocationError, LocationResolver};
use crate::net::HttpClient;

/// Build the resolver named by `options.provider`.
///
/// The local database path is relative to `config_dir` unless absolute.
pub fn resolver_for(
    options: &LocationOptions,
    config_dir: &Path,
    http: Arc<HttpClient>,
) -> Result<Arc<dyn LocationResolver>, LocationError> {
    let ip = IpResolver::new(http.clone(), options.ip_detector_url.clone());

    let resolver: Arc<dyn LocationResolver> = match options.provider {
        LocationProvider::Manual => Arc::new(ManualResolver::new(Location {
            ip: String::new(),
            country: options.country.clone(),
            city: options.city.clone(),
            node_type: options.node_type.clone(),
        })),
        LocationProvider::Builtin => Arc::new(BuiltinResolver::new(ip)),
        LocationProvider::LocalDb => {
            Arc::new(LocalDbResolver::open(&config_dir.join(&options.address), ip)?)
        }
        LocationProvider::Oracle => Arc::new(OracleResolver::new(http, options.address.clone())),
    };

    tracing::info!(provider = resolver.name(), "Location resolver selected");
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::OutgoingFirewall;
    use crate::net::http_client::DEFAULT_TIMEOUT;

    fn http() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(DEFAULT_TIMEOUT, Arc::new(OutgoingFirewall::new())).unwrap())
    }

    #[test]
    fn test_each_provider_maps_to_its_resolver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("db.json"), "{}").unwrap();

        for (provider, expected) in [
            (LocationProvider::Manual, "manual"),
            (LocationProvider::Builtin, "builtin"),
            (LocationProvider::LocalDb, "localdb"),
            (LocationProvider::Oracle, "oracle"),
        ] {
            let options = LocationOptions {
                provider,
                address: "db.json".to_string(),
                country: "LT".to_string(),
                ..Default::default()
            };
            let resolver = resolver_for(&options, dir.path(), http()).unwrap();
            assert_eq!(resolver.name(), expected);
        }
    }

    #[test]
    fn test_localdb_without_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let options = LocationOptions {
            provider: LocationProvider::LocalDb,
            address: "missing.json".to_string(),
            ..Default::default()
        };
        assert!(resolver_for(&options, dir.path(), http()).is_err());
    }
}
