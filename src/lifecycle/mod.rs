//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap (bootstrap.rs):
//!     NodeOptions → stages in order (stage.rs) → Dependencies populated
//!     first failure → BootstrapError { stage, source }, nothing rolled back
//!
//! Steady state:
//!     EventBus → ReconnectWatcher (reconnect.rs), TelemetryBridge, trackers
//!
//! Stop (signals.rs):
//!     SIGTERM/SIGINT or POST /stop → Shutdown broadcast
//!
//! Shutdown (shutdown.rs):
//!     phased teardown of whatever is still held → first TeardownError
//! ```
//!
//! # Design Decisions
//! - The caller owns the aggregate; there is no global node instance
//! - Stages receive their inputs as explicit handles from earlier stages
//! - The API port is bound first so a taken port fails before anything else
//! - Teardown is explicit: bootstrap never releases what it committed
//! - Each teardown step has a timeout; an overrun is logged, not fatal

pub mod bootstrap;
pub mod dependencies;
pub mod directories;
pub mod node;
pub mod reconnect;
pub mod shutdown;
pub mod signals;
pub mod stage;

pub use dependencies::Dependencies;
pub use node::Node;
pub use reconnect::ReconnectWatcher;
pub use shutdown::{Shutdown, TeardownError};
pub use signals::{wait_for_stop, StopReason};
pub use stage::{BootstrapError, ErrorKind, Stage, StageError};
