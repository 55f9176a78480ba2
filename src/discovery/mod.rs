//! Proposal discovery.
//!
//! # Data Flow
//! ```text
//! DiscoveryWorker (polls {api}/proposals)
//!     → ProposalRepository (dedup by provider + service type)
//!     → EventBus (ServiceProposal for new or changed proposals)
//! ```

pub mod repository;
pub mod worker;

pub use repository::ProposalRepository;
pub use worker::DiscoveryWorker;
