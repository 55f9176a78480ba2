//! Options loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::NodeOptions;
use crate::config::validation::{validate_options, ValidationError};

/// Error type for options loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate options from TOML text.
pub fn parse_options(content: &str) -> Result<NodeOptions, ConfigError> {
    let options: NodeOptions = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_options(&options).map_err(ConfigError::Validation)?;

    Ok(options)
}

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<NodeOptions, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_options(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LocationProvider, NetworkPreset, QualityTransportKind};

    #[test]
    fn test_parse_minimal_file() {
        let options = parse_options("").unwrap();
        assert!(options.api.enabled);
    }

    #[test]
    fn test_parse_strategy_sections() {
        let options = parse_options(
            r#"
            port_mapping_enabled = true

            [network]
            preset = "testnet"
            ether_client_rpc = "http://10.0.0.2:8545"

            [quality]
            transport = "elastic"

            [location]
            provider = "manual"
            country = "LT"
            "#,
        )
        .unwrap();

        assert!(options.port_mapping_enabled);
        assert_eq!(options.network.preset, NetworkPreset::Testnet);
        assert_eq!(options.network.ether_client_rpc.as_deref(), Some("http://10.0.0.2:8545"));
        assert_eq!(options.quality.transport, QualityTransportKind::Elastic);
        assert_eq!(options.location.provider, LocationProvider::Manual);
    }

    #[test]
    fn test_unknown_provider_is_a_parse_error() {
        let err = parse_options("[location]\nprovider = \"geoip\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let err = parse_options("[location]\nprovider = \"manual\"\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_options(Path::new("/nonexistent/relay-node.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
