//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt layer, filter from options or RUST_LOG)
//!     → API `/debug/metrics` when profiling is enabled
//! ```
//!
//! # Design Decisions
//! - Structured fields, never pre-formatted messages, for machine parsing
//! - Metric helpers are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
