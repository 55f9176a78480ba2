//! Quality telemetry.
//!
//! # Data Flow
//! ```text
//! EventBus (connection state/session/statistics, proposal, node)
//!     → TelemetryBridge (drop inactive sessions, build one Envelope per event)
//!     → TelemetryTransport strategy (elastic / native / none)
//!
//! NatEvent → NatEventSender → TelemetryBridge::report_mapping_{success,failure}
//! ```
//!
//! # Design Decisions
//! - Fire-and-forget: delivery failures are a single warning, never an error
//! - `createdAt` is taken when the envelope is sent, not when the event happened
//! - No retries and no buffering beyond the in-flight call

pub mod bridge;
pub mod client;
pub mod envelope;
pub mod nat;
pub mod transport;

use thiserror::Error;

pub use bridge::{NatEventReporter, TelemetryBridge};
pub use client::QualityClient;
pub use envelope::{AppInfo, Envelope, EventContext};
pub use nat::NatEventSender;
pub use transport::{transport_for, TelemetryTransport};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telemetry request failed: {0}")]
    Http(#[from] crate::net::HttpError),

    #[error("quality client is not running")]
    NotRunning,
}
