//! NAT service facade.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::nat::{NatError, NatPinger, PortMapper, PortMapping};

/// Owns the selected pinger and mapper plus every mapping made through it.
pub struct NatService {
    pinger: Arc<dyn NatPinger>,
    mapper: Arc<dyn PortMapper>,
    mappings: Mutex<Vec<PortMapping>>,
    enabled: AtomicBool,
}

impl NatService {
    pub fn new(pinger: Arc<dyn NatPinger>, mapper: Arc<dyn PortMapper>) -> Self {
        Self {
            pinger,
            mapper,
            mappings: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub async fn map_port(&self, protocol: &str, port: u16, name: &str) -> Option<PortMapping> {
        if !self.is_enabled() {
            return None;
        }
        let mapping = self.mapper.map(protocol, port, name).await?;
        self.mappings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(mapping.clone());
        Some(mapping)
    }

    /// Release one mapping made through [`NatService::map_port`].
    pub async fn unmap_port(&self, mapping: &PortMapping) -> Result<(), NatError> {
        {
            let mut mappings = self.mappings.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(index) = mappings.iter().position(|m| m == mapping) else {
                // Already released by `disable`.
                return Ok(());
            };
            mappings.remove(index);
        }
        self.mapper.unmap(mapping).await?;
        Ok(())
    }

    pub async fn ping_peer(&self, peer: SocketAddr, ttl: u32) -> Result<(), NatError> {
        if !self.is_enabled() {
            return Err(NatError::Stopped);
        }
        self.pinger.ping_peer(peer, ttl).await
    }

    /// Stop pinging and release every mapping. Safe to call repeatedly.
    pub async fn disable(&self) -> Result<(), NatError> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.pinger.stop();

        let mappings = std::mem::take(
            &mut *self.mappings.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut first_error = None;
        for mapping in &mappings {
            if let Err(e) = self.mapper.unmap(mapping).await {
                tracing::warn!(port = mapping.port, error = %e, "Failed to remove port mapping");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(
            pinger = self.pinger.name(),
            mapper = self.mapper.name(),
            "NAT service disabled"
        );
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn mappings(&self) -> Vec<PortMapping> {
        self.mappings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for NatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatService")
            .field("pinger", &self.pinger.name())
            .field("mapper", &self.mapper.name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
