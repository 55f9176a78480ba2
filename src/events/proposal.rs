//! Service proposals announced by providers.

use serde::{Deserialize, Serialize};

use crate::eventbus::Event;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalLocation {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub node_type: String,
}

/// A provider's offer to serve a given service type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProposal {
    pub provider_id: String,
    pub service_type: String,
    #[serde(default)]
    pub location: ProposalLocation,
}

impl ServiceProposal {
    /// Key that identifies the proposal across announcements.
    pub fn key(&self) -> (String, String) {
        (self.provider_id.clone(), self.service_type.clone())
    }
}

impl Event for ServiceProposal {
    const TOPIC: &'static str = "proposal-announce";
}
