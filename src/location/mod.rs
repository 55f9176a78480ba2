//! Location resolution.
//!
//! # Data Flow
//! ```text
//! LocationProvider option
//!     → factory.rs     picks the resolver strategy once at bootstrap
//!     → resolvers.rs   manual / builtin / localdb / oracle
//!     → cache.rs       LocationCache, refreshed on node and connection events
//!     → OriginResolver::origin() for synchronous lookups (telemetry)
//! ```

pub mod cache;
pub mod factory;
pub mod ip;
pub mod resolvers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::HttpError;

pub use cache::LocationCache;
pub use factory::resolver_for;
pub use ip::IpResolver;

/// Where the node appears to be.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub node_type: String,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location request failed: {0}")]
    Http(#[from] HttpError),

    #[error("location database {path} unusable: {reason}")]
    Database { path: String, reason: String },

    #[error("no location entry for {0}")]
    NotFound(String),

    #[error("origin location has not been resolved yet")]
    Unresolved,
}

/// A strategy for finding out the node's location.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect_location(&self) -> Result<Location, LocationError>;
}

/// Synchronous access to the location the node had before any tunnel came up.
pub trait OriginResolver: Send + Sync {
    fn origin(&self) -> Result<Location, LocationError>;
}
