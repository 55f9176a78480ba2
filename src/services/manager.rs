//! Service instance bookkeeping.
//!
//! A service that declares a `port` in its options gets that port mapped on
//! the gateway for as long as it runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::eventbus::EventBus;
use crate::events::{ServiceStatus, ServiceStatusEvent};
use crate::nat::{NatService, PortMapping};
use crate::services::ServiceError;

const DEFAULT_PROTOCOL: &str = "udp";

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInstance {
    pub id: String,
    pub service_type: String,
    pub options: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_mapping: Option<PortMapping>,
    #[serde(skip)]
    pub started_at: SystemTime,
}

/// Starts, stops and lists the services this node provides.
#[derive(Debug)]
pub struct ServicesManager {
    bus: EventBus,
    nat: Arc<NatService>,
    services: Mutex<BTreeMap<String, ServiceInstance>>,
}

impl ServicesManager {
    pub fn new(bus: EventBus, nat: Arc<NatService>) -> Self {
        Self {
            bus,
            nat,
            services: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start one service of `service_type`; only one per type may run.
    ///
    /// A failed port mapping is logged and the service runs unmapped.
    pub async fn start(
        &self,
        service_type: &str,
        options: Value,
    ) -> Result<ServiceInstance, ServiceError> {
        let port = service_port(&options);
        let mut instance = {
            let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
            if services.values().any(|s| s.service_type == service_type) {
                return Err(ServiceError::AlreadyRunning(service_type.to_string()));
            }
            let instance = ServiceInstance {
                id: Uuid::new_v4().to_string(),
                service_type: service_type.to_string(),
                options,
                port_mapping: None,
                started_at: SystemTime::now(),
            };
            services.insert(instance.id.clone(), instance.clone());
            instance
        };

        if let Some((protocol, port)) = port {
            match self.nat.map_port(&protocol, port, service_type).await {
                Some(mapping) => self.attach_mapping(&mut instance, mapping).await,
                None => tracing::warn!(service_type, port, "Service port is not mapped"),
            }
        }

        tracing::info!(id = %instance.id, service_type, "Service started");
        self.publish(&instance, ServiceStatus::Running);
        Ok(instance)
    }

    async fn attach_mapping(&self, instance: &mut ServiceInstance, mapping: PortMapping) {
        let attached = {
            let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
            match services.get_mut(&instance.id) {
                Some(running) => {
                    running.port_mapping = Some(mapping.clone());
                    true
                }
                None => false,
            }
        };

        if attached {
            instance.port_mapping = Some(mapping);
        } else {
            // Stopped while the port was being mapped.
            self.release(&mapping).await;
        }
    }

    pub async fn stop(&self, id: &str) -> Result<(), ServiceError> {
        let instance = self
            .services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        if let Some(mapping) = &instance.port_mapping {
            self.release(mapping).await;
        }

        tracing::info!(id, service_type = %instance.service_type, "Service stopped");
        self.publish(&instance, ServiceStatus::Stopped);
        Ok(())
    }

    pub fn list(&self) -> Vec<ServiceInstance> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Stop every running service.
    pub async fn kill(&self) -> Result<(), ServiceError> {
        let ids: Vec<String> = self
            .services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();

        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn release(&self, mapping: &PortMapping) {
        if let Err(e) = self.nat.unmap_port(mapping).await {
            tracing::warn!(port = mapping.port, error = %e, "Failed to release service port");
        }
    }

    fn publish(&self, instance: &ServiceInstance, status: ServiceStatus) {
        self.bus.publish(ServiceStatusEvent {
            id: instance.id.clone(),
            service_type: instance.service_type.clone(),
            status,
        });
    }
}

/// `(protocol, port)` declared in service options, if any.
fn service_port(options: &Value) -> Option<(String, u16)> {
    let port = options.get("port")?.as_u64()?;
    let port = u16::try_from(port).ok().filter(|p| *p != 0)?;
    let protocol = options
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL);
    Some((protocol.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::events::NatEvent;
    use crate::nat::mapping::{GatewayPortMapper, NoopPortMapper};
    use crate::nat::pinger::NoopPinger;
    use crate::nat::GatewayLoader;

    fn manager(bus: EventBus) -> ServicesManager {
        let nat = NatService::new(Arc::new(NoopPinger), Arc::new(NoopPortMapper));
        ServicesManager::new(bus, Arc::new(nat))
    }

    #[test]
    fn test_service_port_from_options() {
        assert_eq!(service_port(&json!({"port": 51820})), Some(("udp".to_string(), 51820)));
        assert_eq!(
            service_port(&json!({"port": 1194, "protocol": "tcp"})),
            Some(("tcp".to_string(), 1194))
        );
        assert_eq!(service_port(&json!({"port": 70000})), None);
        assert_eq!(service_port(&json!({"port": 0})), None);
        assert_eq!(service_port(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_one_service_per_type() {
        let manager = manager(EventBus::new());
        manager.start("wireguard", json!({})).await.unwrap();
        let err = manager.start("wireguard", json!({})).await.unwrap_err();
        assert_eq!(err, ServiceError::AlreadyRunning("wireguard".to_string()));
    }

    #[tokio::test]
    async fn test_kill_stops_everything_and_publishes() {
        let bus = EventBus::new();
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let s = stopped.clone();
        bus.subscribe(move |e: ServiceStatusEvent| {
            if e.status == ServiceStatus::Stopped {
                s.lock().unwrap().push(e.service_type);
            }
        })
        .unwrap();

        let manager = manager(bus);
        manager.start("wireguard", json!({"port": 51820})).await.unwrap();
        manager.start("scraping", Value::Null).await.unwrap();

        manager.kill().await.unwrap();
        assert!(manager.list().is_empty());
        assert_eq!(stopped.lock().unwrap().len(), 2);

        manager.kill().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_unknown() {
        let manager = manager(EventBus::new());
        assert!(matches!(manager.stop("nope").await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_service_port_is_mapped_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route");
        std::fs::write(&path, "Iface\tDestination\tGateway\neth0\t00000000\t0101A8C0\n").unwrap();

        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        bus.subscribe(move |event: NatEvent| e.lock().unwrap().push(event)).unwrap();

        let mapper = Arc::new(GatewayPortMapper::new(
            Arc::new(GatewayLoader::with_source(path)),
            bus.clone(),
        ));
        let nat = Arc::new(NatService::new(Arc::new(NoopPinger), mapper.clone()));
        let manager = ServicesManager::new(bus, nat.clone());

        let instance = manager.start("wireguard", json!({"port": 51820})).await.unwrap();
        let mapping = instance.port_mapping.unwrap();
        assert_eq!((mapping.protocol.as_str(), mapping.port), ("udp", 51820));
        assert_eq!(mapper.active().len(), 1);
        assert!(events.lock().unwrap()[0].successful);

        manager.stop(&instance.id).await.unwrap();
        assert!(mapper.active().is_empty());
        assert!(nat.mappings().is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_service_still_runs() {
        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        bus.subscribe(move |event: NatEvent| e.lock().unwrap().push(event)).unwrap();

        let mapper = GatewayPortMapper::new(
            Arc::new(GatewayLoader::with_source("/nonexistent/route")),
            bus.clone(),
        );
        let nat = NatService::new(Arc::new(NoopPinger), Arc::new(mapper));
        let manager = ServicesManager::new(bus, Arc::new(nat));

        let instance = manager
            .start("openvpn", json!({"port": 1194, "protocol": "tcp"}))
            .await
            .unwrap();
        assert!(instance.port_mapping.is_none());
        assert_eq!(manager.list().len(), 1);
        assert!(!events.lock().unwrap()[0].successful);
    }
}
