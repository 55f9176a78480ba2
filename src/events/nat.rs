//! NAT traversal outcome events.

use crate::eventbus::Event;

/// Outcome of one NAT traversal stage, e.g. a port mapping attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatEvent {
    pub stage: String,
    pub successful: bool,
    pub error: Option<String>,
}

impl NatEvent {
    pub const STAGE_PORT_MAPPING: &'static str = "port_mapping";
    pub const STAGE_HOLE_PUNCHING: &'static str = "hole_punching";

    pub fn success(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            successful: true,
            error: None,
        }
    }

    pub fn failure(stage: impl Into<String>, error: impl ToString) -> Self {
        Self {
            stage: stage.into(),
            successful: false,
            error: Some(error.to_string()),
        }
    }
}

impl Event for NatEvent {
    const TOPIC: &'static str = "nat";
}
