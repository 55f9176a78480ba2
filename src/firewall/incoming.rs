//! Incoming service traffic firewall.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::firewall::{endpoint_host, FirewallError};

/// Firewall guarding traffic of services this node provides.
pub trait IncomingFirewall: Send + Sync + std::fmt::Debug {
    fn setup(&self) -> Result<(), FirewallError>;
    fn allow_url_access(&self, urls: &[&str]) -> Result<(), FirewallError>;
    fn teardown(&self);
    fn is_enforcing(&self) -> bool;
}

/// Pick the implementation from the `firewall.incoming_enabled` option.
pub fn incoming_firewall(enabled: bool) -> Arc<dyn IncomingFirewall> {
    if enabled {
        Arc::new(EnforcingIncomingFirewall::default())
    } else {
        Arc::new(NoopIncomingFirewall)
    }
}

#[derive(Debug, Default)]
pub struct EnforcingIncomingFirewall {
    active: AtomicBool,
    allowed_hosts: Mutex<HashSet<String>>,
}

impl EnforcingIncomingFirewall {
    pub fn allows(&self, url: &str) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return true;
        }
        let hosts = self.allowed_hosts.lock().unwrap_or_else(PoisonError::into_inner);
        endpoint_host(url).is_ok_and(|host| hosts.contains(&host))
    }
}

impl IncomingFirewall for EnforcingIncomingFirewall {
    fn setup(&self) -> Result<(), FirewallError> {
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("Incoming service firewall enabled");
        Ok(())
    }

    fn allow_url_access(&self, urls: &[&str]) -> Result<(), FirewallError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(FirewallError::NotSetUp);
        }
        let hosts = urls
            .iter()
            .filter(|url| !url.is_empty())
            .map(|url| endpoint_host(url))
            .collect::<Result<Vec<_>, _>>()?;
        self.allowed_hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(hosts);
        Ok(())
    }

    fn teardown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.allowed_hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("Incoming service firewall removed");
    }

    fn is_enforcing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIncomingFirewall;

impl IncomingFirewall for NoopIncomingFirewall {
    fn setup(&self) -> Result<(), FirewallError> {
        Ok(())
    }

    fn allow_url_access(&self, _urls: &[&str]) -> Result<(), FirewallError> {
        Ok(())
    }

    fn teardown(&self) {}

    fn is_enforcing(&self) -> bool {
        false
    }
}
