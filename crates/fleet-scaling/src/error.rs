//! Scaling error types

use fleet_types::ServiceName;
use thiserror::Error;

/// Scaling profile errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalingError {
    #[error("Unknown size tag '{0}'")]
    UnknownSizeTag(String),

    #[error("Unknown size tag '{tag}' on service {service}")]
    UnknownServiceSizeTag { service: ServiceName, tag: String },

    #[error("Invalid scaling bounds for service {service}: min={min}, max={max}")]
    InvalidScalingBounds {
        service: ServiceName,
        min: i64,
        max: i64,
    },

    #[error("Invalid target CPU utilization for service {service}: {value}% (expected 1-100)")]
    InvalidTargetUtilization { service: ServiceName, value: u8 },
}

impl ScalingError {
    /// Service the error refers to, if any
    pub fn service(&self) -> Option<&ServiceName> {
        match self {
            ScalingError::UnknownSizeTag(_) => None,
            ScalingError::UnknownServiceSizeTag { service, .. }
            | ScalingError::InvalidScalingBounds { service, .. }
            | ScalingError::InvalidTargetUtilization { service, .. } => Some(service),
        }
    }
}

/// Result type for scaling operations
pub type Result<T> = std::result::Result<T, ScalingError>;
