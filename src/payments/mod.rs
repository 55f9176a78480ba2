//! Settlement state.
//!
//! Payment math stays with the chain; this module only tracks what the
//! node's identities hold so the API and state keeper can report it.

pub mod balance;

pub use balance::BalanceTracker;
