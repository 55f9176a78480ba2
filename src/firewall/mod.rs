//! Traffic policy subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap (firewall stage)
//!     → outgoing.rs   OutgoingFirewall::setup()  default-deny from here on
//!     → incoming.rs   service firewall selected by `firewall.incoming_enabled`
//! later stages
//!     → allow_url_access(endpoints) before a client may reach them
//! shutdown
//!     → incoming teardown, outgoing reset
//! ```
//!
//! # Design Decisions
//! - Policy lives in-process; OS packet filtering is out of scope
//! - Exceptions are keyed by host, so one rule covers every port/path of an endpoint

pub mod incoming;
pub mod outgoing;

use thiserror::Error;

pub use incoming::{
    incoming_firewall, EnforcingIncomingFirewall, IncomingFirewall, NoopIncomingFirewall,
};
pub use outgoing::OutgoingFirewall;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirewallError {
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("firewall is not set up")]
    NotSetUp,
}

/// Extract the host part of an endpoint URL.
pub(crate) fn endpoint_host(url: &str) -> Result<String, FirewallError> {
    let parsed = url::Url::parse(url).map_err(|e| FirewallError::InvalidEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| FirewallError::InvalidEndpoint {
            url: url.to_string(),
            reason: "no host".to_string(),
        })
}
