//! Node identity.
//!
//! Identities are secp256k1 keys kept one per file in the keystore
//! directory. The manager makes sure at least one exists and signs with it.

pub mod keystore;
pub mod manager;

use std::path::PathBuf;

use alloy::primitives::Address;
use thiserror::Error;

pub use keystore::Keystore;
pub use manager::IdentityManager;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("keystore I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key file {path}: {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    #[error("unknown identity {0}")]
    UnknownIdentity(Address),

    #[error("signing failed: {0}")]
    Signing(String),
}
