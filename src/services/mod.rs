//! Provided services.

pub mod manager;

use thiserror::Error;

pub use manager::{ServiceInstance, ServicesManager};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("a {0} service is already running")]
    AlreadyRunning(String),

    #[error("service {0} not found")]
    NotFound(String),
}
