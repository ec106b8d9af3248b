//! Planning error types

use fleet_credentials::CredentialError;
use fleet_scaling::ScalingError;
use fleet_topology::TopologyError;
use fleet_types::{ServiceName, SpecValidationError};
use thiserror::Error;

/// Planning errors
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid fleet spec: {0}")]
    Spec(#[from] SpecValidationError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Scaling(#[from] ScalingError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Two sources want the same environment variable of one service
    #[error("Env var '{env}' of service '{service}' set by both {first} and {second}")]
    EnvCollision {
        service: ServiceName,
        env: String,
        first: EnvSource,
        second: EnvSource,
    },

    #[error("Plan serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where a runtime environment variable comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSource {
    Declared,
    Secret,
    Endpoint,
    VerifyingKey,
}

impl std::fmt::Display for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnvSource::Declared => "declared env",
            EnvSource::Secret => "secret binding",
            EnvSource::Endpoint => "endpoint binding",
            EnvSource::VerifyingKey => "verifying key",
        };
        f.write_str(name)
    }
}

/// Failure kind, independent of which component reported it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanErrorKind {
    InvalidTopology,
    InvalidDuration,
    InvalidScalingBounds,
    UnknownSizeTag,
    /// Token claims that cannot be signed as declared
    InvalidCredential,
    Serialization,
}

impl PlanError {
    pub fn kind(&self) -> PlanErrorKind {
        match self {
            PlanError::Spec(SpecValidationError::InvalidHealthCheck { .. }) => {
                PlanErrorKind::InvalidDuration
            }
            PlanError::Spec(SpecValidationError::Parse(_)) => PlanErrorKind::Serialization,
            PlanError::Spec(_) | PlanError::Topology(_) | PlanError::EnvCollision { .. } => {
                PlanErrorKind::InvalidTopology
            }
            PlanError::Scaling(
                ScalingError::UnknownSizeTag(_) | ScalingError::UnknownServiceSizeTag { .. },
            ) => PlanErrorKind::UnknownSizeTag,
            PlanError::Scaling(_) => PlanErrorKind::InvalidScalingBounds,
            PlanError::Credentials(CredentialError::InvalidDuration { .. }) => {
                PlanErrorKind::InvalidDuration
            }
            PlanError::Credentials(_) => PlanErrorKind::InvalidCredential,
            PlanError::Serialization(_) => PlanErrorKind::Serialization,
        }
    }
}

/// Result type for planning
pub type Result<T> = std::result::Result<T, PlanError>;
