//! Connection lifecycle events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::eventbus::Event;
use crate::events::proposal::ServiceProposal;

/// Consumer connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of the session an event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Empty when no session is established.
    pub session_id: String,
    pub consumer_id: String,
    pub proposal: ServiceProposal,
}

impl SessionInfo {
    /// A session is active only once it carries an id.
    pub fn is_active(&self) -> bool {
        !self.session_id.is_empty()
    }

    pub fn provider_id(&self) -> &str {
        &self.proposal.provider_id
    }

    pub fn service_type(&self) -> &str {
        &self.proposal.service_type
    }

    pub fn provider_country(&self) -> &str {
        &self.proposal.location.country
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateEvent {
    pub state: ConnectionState,
    pub session_info: SessionInfo,
}

impl ConnectionStateEvent {
    /// State change with no session attached.
    pub fn bare(state: ConnectionState) -> Self {
        Self {
            state,
            session_info: SessionInfo::default(),
        }
    }
}

impl Event for ConnectionStateEvent {
    const TOPIC: &'static str = "connection-state";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSessionEvent {
    /// Session lifecycle status, e.g. "Created" or "Destroyed".
    pub status: String,
    pub session_info: SessionInfo,
}

impl ConnectionSessionEvent {
    pub const CREATED: &'static str = "Created";
    pub const DESTROYED: &'static str = "Destroyed";
}

impl Event for ConnectionSessionEvent {
    const TOPIC: &'static str = "connection-session";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatistics {
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatisticsEvent {
    pub stats: ConnectionStatistics,
    pub session_info: SessionInfo,
}

impl Event for ConnectionStatisticsEvent {
    const TOPIC: &'static str = "connection-statistics";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_activity() {
        let mut info = SessionInfo::default();
        assert!(!info.is_active());
        info.session_id = "session-1".to_string();
        assert!(info.is_active());
    }

    #[test]
    fn test_default_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::NotConnected);
        assert_eq!(ConnectionState::Disconnecting.to_string(), "Disconnecting");
    }
}
