//! Outgoing traffic policy.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::firewall::{endpoint_host, FirewallError};

#[derive(Debug, Default)]
struct Policy {
    default_deny: bool,
    allowed_hosts: HashSet<String>,
}

/// Process-wide outgoing policy. Permissive until `setup()` installs default-deny.
#[derive(Debug, Default)]
pub struct OutgoingFirewall {
    policy: RwLock<Policy>,
}

impl OutgoingFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the default-deny policy.
    pub fn setup(&self) -> Result<(), FirewallError> {
        let mut policy = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        policy.default_deny = true;
        tracing::info!("Outgoing firewall installed with default-deny policy");
        Ok(())
    }

    /// Allow traffic to the hosts of the given endpoints. All-or-nothing.
    pub fn allow_url_access(&self, urls: &[&str]) -> Result<(), FirewallError> {
        let hosts = urls
            .iter()
            .filter(|url| !url.is_empty())
            .map(|url| endpoint_host(url))
            .collect::<Result<Vec<_>, _>>()?;

        let mut policy = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        if !policy.default_deny {
            return Err(FirewallError::NotSetUp);
        }
        for host in hosts {
            tracing::debug!(host = %host, "Outgoing firewall exception added");
            policy.allowed_hosts.insert(host);
        }
        Ok(())
    }

    /// Whether a request to `url` would pass the policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let policy = self.policy.read().unwrap_or_else(PoisonError::into_inner);
        if !policy.default_deny {
            return true;
        }
        endpoint_host(url).is_ok_and(|host| policy.allowed_hosts.contains(&host))
    }

    pub fn is_default_deny(&self) -> bool {
        self.policy.read().unwrap_or_else(PoisonError::into_inner).default_deny
    }

    /// Drop every rule and return to the permissive state.
    pub fn reset(&self) {
        let mut policy = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        policy.default_deny = false;
        policy.allowed_hosts.clear();
        tracing::info!("Outgoing firewall reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deny_with_exceptions() {
        let firewall = OutgoingFirewall::new();
        assert!(firewall.is_allowed("https://example.com"));

        firewall.setup().unwrap();
        assert!(!firewall.is_allowed("https://example.com"));

        firewall
            .allow_url_access(&["https://Example.com/api", "nats://broker.local:4222"])
            .unwrap();
        assert!(firewall.is_allowed("https://example.com/other"));
        assert!(firewall.is_allowed("nats://broker.local:4333"));
        assert!(!firewall.is_allowed("https://elsewhere.org"));
    }

    #[test]
    fn test_exception_requires_setup() {
        let firewall = OutgoingFirewall::new();
        assert_eq!(
            firewall.allow_url_access(&["https://example.com"]),
            Err(FirewallError::NotSetUp)
        );
    }

    #[test]
    fn test_invalid_endpoint_adds_nothing() {
        let firewall = OutgoingFirewall::new();
        firewall.setup().unwrap();
        let err = firewall
            .allow_url_access(&["https://ok.example", "not a url"])
            .unwrap_err();
        assert!(matches!(err, FirewallError::InvalidEndpoint { .. }));
        assert!(!firewall.is_allowed("https://ok.example"));
    }

    #[test]
    fn test_reset() {
        let firewall = OutgoingFirewall::new();
        firewall.setup().unwrap();
        firewall.reset();
        assert!(!firewall.is_default_deny());
        assert!(firewall.is_allowed("https://anything.example"));
    }
}
