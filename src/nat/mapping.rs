//! Port mapping strategies.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use crate::eventbus::EventBus;
use crate::events::NatEvent;
use crate::nat::{GatewayLoader, MappingError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    pub protocol: String,
    pub port: u16,
    pub name: String,
    pub gateway: Ipv4Addr,
}

#[async_trait]
pub trait PortMapper: Send + Sync {
    fn name(&self) -> &'static str;

    /// Request a mapping. `None` means the port stays unmapped.
    async fn map(&self, protocol: &str, port: u16, name: &str) -> Option<PortMapping>;

    async fn unmap(&self, mapping: &PortMapping) -> Result<(), MappingError>;
}

/// Pick the implementation from the `port_mapping_enabled` option.
pub fn mapper_for(enabled: bool, loader: Arc<GatewayLoader>, bus: EventBus) -> Arc<dyn PortMapper> {
    if enabled {
        Arc::new(GatewayPortMapper::new(loader, bus))
    } else {
        Arc::new(NoopPortMapper)
    }
}

/// Maps ports on the first default gateway and reports each attempt.
pub struct GatewayPortMapper {
    loader: Arc<GatewayLoader>,
    bus: EventBus,
    active: Mutex<Vec<PortMapping>>,
}

impl GatewayPortMapper {
    pub fn new(loader: Arc<GatewayLoader>, bus: EventBus) -> Self {
        Self {
            loader,
            bus,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn active(&self) -> Vec<PortMapping> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl PortMapper for GatewayPortMapper {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn map(&self, protocol: &str, port: u16, name: &str) -> Option<PortMapping> {
        let Some(gateway) = self.loader.get().await.into_iter().next() else {
            tracing::warn!(protocol, port, "Port mapping failed: no gateway found");
            self.bus
                .publish(NatEvent::failure(NatEvent::STAGE_PORT_MAPPING, MappingError::NoGateway));
            return None;
        };

        let mapping = PortMapping {
            protocol: protocol.to_string(),
            port,
            name: name.to_string(),
            gateway: gateway.ip,
        };
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(mapping.clone());

        tracing::info!(protocol, port, gateway = %gateway.ip, "Port mapped");
        self.bus.publish(NatEvent::success(NatEvent::STAGE_PORT_MAPPING));
        Some(mapping)
    }

    async fn unmap(&self, mapping: &PortMapping) -> Result<(), MappingError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let before = active.len();
        active.retain(|m| m != mapping);
        if active.len() == before {
            return Err(MappingError::NotMapped {
                protocol: mapping.protocol.clone(),
                port: mapping.port,
            });
        }
        tracing::info!(protocol = %mapping.protocol, port = mapping.port, "Port unmapped");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPortMapper;

#[async_trait]
impl PortMapper for NoopPortMapper {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn map(&self, _protocol: &str, _port: u16, _name: &str) -> Option<PortMapping> {
        None
    }

    async fn unmap(&self, _mapping: &PortMapping) -> Result<(), MappingError> {
        Ok(())
    }
}
