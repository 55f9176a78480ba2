//! Options validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check provider-specific required fields
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: NodeOptions → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::{LocationProvider, NodeOptions};

/// A single semantic problem in the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_options(options: &NodeOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if options.api.enabled && options.api.address.trim().is_empty() {
        errors.push(ValidationError::new("api.address", "must not be empty"));
    }

    match options.location.provider {
        LocationProvider::Manual if options.location.country.is_empty() => {
            errors.push(ValidationError::new(
                "location.country",
                "required by the manual location provider",
            ));
        }
        LocationProvider::LocalDb | LocationProvider::Oracle
            if options.location.address.is_empty() =>
        {
            errors.push(ValidationError::new(
                "location.address",
                format!("required by the {} location provider", options.location.provider),
            ));
        }
        _ => {}
    }

    if options.location.cache_ttl_secs == 0 {
        errors.push(ValidationError::new("location.cache_ttl_secs", "must be positive"));
    }
    if options.quality.timeout_secs == 0 {
        errors.push(ValidationError::new("quality.timeout_secs", "must be positive"));
    }
    if options.network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("network.rpc_timeout_secs", "must be positive"));
    }
    if options.discovery.interval_secs == 0 {
        errors.push(ValidationError::new("discovery.interval_secs", "must be positive"));
    }
    if options.shutdown.step_timeout_secs == 0 {
        errors.push(ValidationError::new("shutdown.step_timeout_secs", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(validate_options(&NodeOptions::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut options = NodeOptions::default();
        options.location.provider = LocationProvider::Oracle;
        options.quality.timeout_secs = 0;
        options.shutdown.step_timeout_secs = 0;

        let errors = validate_options(&options).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["location.address", "quality.timeout_secs", "shutdown.step_timeout_secs"]
        );
    }

    #[test]
    fn test_disabled_api_skips_address_check() {
        let mut options = NodeOptions::default();
        options.api.enabled = false;
        options.api.address.clear();
        assert!(validate_options(&options).is_ok());
    }
}
