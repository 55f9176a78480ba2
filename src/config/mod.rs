//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! options file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → NodeOptions (validated, immutable)
//!     → network.rs resolves the network definition at bootstrap
//! ```
//!
//! # Design Decisions
//! - Options are immutable once loaded; bootstrap reads them, never writes
//! - All fields have defaults to allow minimal files
//! - Strategy enums are closed: unknown names fail to parse

pub mod loader;
pub mod network;
pub mod schema;
pub mod validation;

pub use loader::{load_options, ConfigError};
pub use network::NetworkDefinition;
pub use schema::{
    ApiOptions, DirectoryOptions, LocationOptions, LocationProvider, NetworkOptions,
    NetworkPreset, NodeOptions, QualityOptions, QualityTransportKind,
};
