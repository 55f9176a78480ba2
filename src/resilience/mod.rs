//! Resilience helpers for background pollers.

pub mod backoff;

pub use backoff::calculate_backoff;
