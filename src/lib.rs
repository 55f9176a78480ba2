//! Relay node library.
//!
//! Process lifecycle for a decentralized VPN relay node: ordered bootstrap of
//! every subsystem, phased shutdown, reconnect on connectivity changes, and
//! best-effort telemetry to a quality oracle.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod discovery;
pub mod eventbus;
pub mod events;
pub mod firewall;
pub mod identity;
pub mod lifecycle;
pub mod location;
pub mod nat;
pub mod net;
pub mod observability;
pub mod payments;
pub mod resilience;
pub mod services;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use config::NodeOptions;
pub use eventbus::EventBus;
pub use lifecycle::{Dependencies, Shutdown};
