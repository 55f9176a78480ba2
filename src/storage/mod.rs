//! Persistent storage subsystem.
//!
//! # Data Flow
//! ```text
//! bootstrap (storage stage)
//!     → store.rs       JsonStore::open(dir)      buckets of JSON values, one file
//!     → migrations.rs  run HISTORY once, in order, recorded in the meta bucket
//!     → sessions.rs    SessionStorage subscribes to session events
//! shutdown (last phase)
//!     → JsonStore::close()  final flush, later calls fail
//! ```
//!
//! # Design Decisions
//! - Writes go through to disk via write-then-rename
//! - The store is closed last so every other component can still flush into it

pub mod migrations;
pub mod sessions;
pub mod store;

use thiserror::Error;

pub use migrations::{Migration, HISTORY};
pub use sessions::{SessionRecord, SessionStorage};
pub use store::{JsonStore, PersistentStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage is closed")]
    Closed,

    #[error("migration {name} failed: {reason}")]
    Migration { name: &'static str, reason: String },
}
