//! In-process publish/subscribe.
//!
//! # Data Flow
//! ```text
//! publisher
//!     → EventBus::publish(event)        topic = E::TOPIC
//!     → inline subscribers              called on the publisher's task
//!     → queued subscribers              one channel + task per subscription
//! ```
//!
//! # Design Decisions
//! - Topics are typed: a topic name belongs to exactly one event type
//! - Each async subscription is served by its own task, so deliveries to it are serialized
//! - A panicking subscriber is logged and never reaches the publisher or other subscribers
//! - No lock is held while a subscriber runs

pub mod bus;

pub use bus::{BusError, Event, EventBus};
