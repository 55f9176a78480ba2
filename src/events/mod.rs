//! Domain events published on the event bus.
//!
//! # Topics
//! ```text
//! connection-state       ConnectionStateEvent       connection lifecycle transitions
//! connection-session     ConnectionSessionEvent     session created/destroyed
//! connection-statistics  ConnectionStatisticsEvent  transferred bytes for a session
//! proposal-announce      ServiceProposal            proposal seen by discovery
//! node                   NodeEvent                  node started/stopped
//! nat                    NatEvent                   NAT traversal stage outcome
//! service-status         ServiceStatusEvent         provided service started/stopped
//! ```

pub mod connection;
pub mod nat;
pub mod node;
pub mod proposal;
pub mod service;

pub use connection::{
    ConnectionState, ConnectionStateEvent, ConnectionSessionEvent, ConnectionStatistics,
    ConnectionStatisticsEvent, SessionInfo,
};
pub use nat::NatEvent;
pub use node::{NodeEvent, NodeStatus};
pub use proposal::{ProposalLocation, ServiceProposal};
pub use service::{ServiceStatus, ServiceStatusEvent};
