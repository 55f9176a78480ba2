//! Telemetry wire format.

use std::collections::HashMap;

use serde::Serialize;

use crate::events::ServiceProposal;

pub const APP_NAME: &str = "relay-node";

pub const SESSION_DATA: &str = "session_data";
pub const SESSION_EVENT: &str = "session_event";
pub const STARTUP: &str = "startup";
pub const PROPOSAL_EVENT: &str = "proposal_event";
pub const NAT_MAPPING: &str = "nat_mapping";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
}

impl AppInfo {
    /// Metadata of the running binary.
    pub fn current(version: impl Into<String>) -> Self {
        Self {
            name: APP_NAME.to_string(),
            version: version.into(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// One forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub application: AppInfo,
    pub event_name: &'static str,
    pub created_at: i64,
    pub context: EventContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventContext {
    SessionEvent(SessionEventContext),
    SessionData(SessionDataContext),
    Startup(String),
    Proposal(ServiceProposal),
    NatMapping(NatMappingContext),
}

/// Identifiers shared by every session-scoped context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionContext {
    #[serde(rename = "ID")]
    pub id: String,
    pub consumer: String,
    pub provider: String,
    pub service_type: String,
    pub provider_country: String,
    pub consumer_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEventContext {
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(flatten)]
    pub session: SessionContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDataContext {
    #[serde(rename = "Rx")]
    pub rx: u64,
    #[serde(rename = "Tx")]
    pub tx: u64,
    #[serde(flatten)]
    pub session: SessionContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NatMappingContext {
    pub stage: String,
    pub successful: bool,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<HashMap<String, String>>,
}
