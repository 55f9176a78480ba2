//! Provided service lifecycle events.

use serde::Serialize;

use crate::eventbus::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatusEvent {
    pub id: String,
    pub service_type: String,
    pub status: ServiceStatus,
}

impl Event for ServiceStatusEvent {
    const TOPIC: &'static str = "service-status";
}
