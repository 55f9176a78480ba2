//! Node lifecycle events.

use serde::Serialize;

use crate::eventbus::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeStatus {
    Started,
    Stopped,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Started => "Started",
            NodeStatus::Stopped => "Stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    pub status: NodeStatus,
}

impl Event for NodeEvent {
    const TOPIC: &'static str = "node";
}
