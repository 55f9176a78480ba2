//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! network definition (ether_client_rpc, chain_id)
//!     → client.rs (RPC provider with timeouts, swapped on reconnect)
//!     → payments (balance tracking)
//! ```
//!
//! # Design Decisions
//! - Construction never touches the network; chain verification is a separate call
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod types;

pub use client::ChainClient;
pub use types::{ChainError, ChainId, ChainResult};
