//! Coordinator error types

use thiserror::Error;

/// Errors surfaced to event producers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Coordinator has stopped")]
    Closed,
}

/// A single failed delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Redeploy request rejected: {0}")]
    Rejected(String),

    #[error("Redeploy request dropped without acknowledgment")]
    NotAcknowledged,

    #[error("Acknowledgment timed out after {0}ms")]
    Timeout(u64),

    #[error("Redeploy channel closed")]
    SinkClosed,
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
