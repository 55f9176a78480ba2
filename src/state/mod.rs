//! Aggregated node state.
//!
//! The keeper is built after every source it reads from and subscribes last,
//! so each event it sees has already been applied by its source.

pub mod keeper;

pub use keeper::{NodeState, StateKeeper};
