//! Error types for fleet-daemon

use fleet_plan::PlanError;
use fleet_redeploy::CoordinatorError;
use fleet_types::SpecValidationError;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fleet spec could not be loaded
    #[error("Fleet spec error: {0}")]
    Spec(#[from] SpecValidationError),

    /// Planning failed; nothing was provisioned
    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),

    /// Coordinator stopped unexpectedly
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(e: config::ConfigError) -> Self {
        DaemonError::Config(e.to_string())
    }
}

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
