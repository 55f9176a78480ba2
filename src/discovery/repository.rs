//! In-memory proposal repository.

use dashmap::DashMap;

use crate::events::ServiceProposal;

/// Latest known proposal per (provider, service type).
#[derive(Debug, Default)]
pub struct ProposalRepository {
    proposals: DashMap<(String, String), ServiceProposal>,
}

impl ProposalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `proposal`. Returns true when it was unknown or differs from the stored one.
    pub fn upsert(&self, proposal: ServiceProposal) -> bool {
        match self.proposals.insert(proposal.key(), proposal.clone()) {
            Some(previous) => previous != proposal,
            None => true,
        }
    }

    pub fn get(&self, provider_id: &str, service_type: &str) -> Option<ServiceProposal> {
        self.proposals
            .get(&(provider_id.to_string(), service_type.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn all(&self) -> Vec<ServiceProposal> {
        self.proposals.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(provider: &str, country: &str) -> ServiceProposal {
        let mut proposal = ServiceProposal {
            provider_id: provider.to_string(),
            service_type: "wireguard".to_string(),
            ..Default::default()
        };
        proposal.location.country = country.to_string();
        proposal
    }

    #[test]
    fn test_upsert_reports_changes_only() {
        let repo = ProposalRepository::new();
        assert!(repo.upsert(proposal("0x1", "LT")));
        assert!(!repo.upsert(proposal("0x1", "LT")));
        assert!(repo.upsert(proposal("0x1", "DE")));
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get("0x1", "wireguard").unwrap().location.country, "DE");
    }
}
