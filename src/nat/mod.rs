//! NAT traversal support.
//!
//! # Data Flow
//! ```text
//! GatewayLoader (default gateways, warmed up in the background)
//!     → PortMapper strategy (gateway vs no-op)  ─┐
//! NatPinger strategy (hole punching vs no-op)  ──┴→ NatEvent on the bus
//!     → NatTracker / NatStatusTracker (read models)
//!     → telemetry NatEventSender
//! ```
//!
//! The traversal protocols themselves live with the service implementations;
//! this module owns selection, bookkeeping and teardown.

pub mod gateway;
pub mod mapping;
pub mod pinger;
pub mod service;
pub mod tracker;

use thiserror::Error;

pub use gateway::{Gateway, GatewayLoader};
pub use mapping::{mapper_for, PortMapper, PortMapping};
pub use pinger::{pinger_for, NatPinger};
pub use service::NatService;
pub use tracker::{NatStatus, NatStatusTracker, NatTracker};

#[derive(Debug, Error)]
pub enum NatError {
    #[error("NAT socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pinger is stopped")]
    Stopped,

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("no gateway found")]
    NoGateway,

    #[error("no mapping for {protocol} port {port}")]
    NotMapped { protocol: String, port: u16 },
}
