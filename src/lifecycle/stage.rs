//! Bootstrap stages and their errors.

use std::fmt;

use thiserror::Error;

use crate::eventbus::BusError;

/// Bootstrap stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Options,
    ApiListener,
    Directories,
    Firewall,
    EventBus,
    Storage,
    Network,
    Identity,
    Settlement,
    Discovery,
    Location,
    Nat,
    Services,
    Quality,
    StateKeeper,
    Node,
    ReconnectWatcher,
    Start,
}

impl Stage {
    pub const ALL: [Stage; 18] = [
        Stage::Options,
        Stage::ApiListener,
        Stage::Directories,
        Stage::Firewall,
        Stage::EventBus,
        Stage::Storage,
        Stage::Network,
        Stage::Identity,
        Stage::Settlement,
        Stage::Discovery,
        Stage::Location,
        Stage::Nat,
        Stage::Services,
        Stage::Quality,
        Stage::StateKeeper,
        Stage::Node,
        Stage::ReconnectWatcher,
        Stage::Start,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Options => "options",
            Stage::ApiListener => "api-listener",
            Stage::Directories => "directories",
            Stage::Firewall => "firewall",
            Stage::EventBus => "event-bus",
            Stage::Storage => "storage",
            Stage::Network => "network",
            Stage::Identity => "identity",
            Stage::Settlement => "settlement",
            Stage::Discovery => "discovery",
            Stage::Location => "location",
            Stage::Nat => "nat",
            Stage::Services => "services",
            Stage::Quality => "quality",
            Stage::StateKeeper => "state-keeper",
            Stage::Node => "node",
            Stage::ReconnectWatcher => "reconnect-watcher",
            Stage::Start => "start",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage could not commit.
#[derive(Debug, Error)]
pub enum StageError {
    /// Unknown or contradictory option value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An exclusive or external resource could not be acquired.
    #[error("cannot acquire {resource}: {reason}")]
    ResourceAcquisition { resource: &'static str, reason: String },

    /// The event bus rejected a subscription.
    #[error("subscription rejected: {0}")]
    Subscription(#[from] BusError),
}

impl StageError {
    pub fn resource(resource: &'static str, reason: impl fmt::Display) -> Self {
        StageError::ResourceAcquisition {
            resource,
            reason: reason.to_string(),
        }
    }

    pub fn configuration(reason: impl fmt::Display) -> Self {
        StageError::Configuration(reason.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceAcquisition,
    Subscription,
}

/// A stage failure tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("bootstrap stage {stage} failed: {source}")]
pub struct BootstrapError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl BootstrapError {
    pub fn kind(&self) -> ErrorKind {
        match self.source {
            StageError::Configuration(_) => ErrorKind::Configuration,
            StageError::ResourceAcquisition { .. } => ErrorKind::ResourceAcquisition,
            StageError::Subscription(_) => ErrorKind::Subscription,
        }
    }
}
