//! Topology error types

use fleet_types::ServiceName;
use thiserror::Error;

/// Topology errors
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Invalid topology at service {service}: {violation}")]
    InvalidTopology {
        /// The offending service
        service: ServiceName,
        violation: TopologyViolation,
    },
}

impl TopologyError {
    pub(crate) fn invalid(service: &ServiceName, violation: TopologyViolation) -> Self {
        Self::InvalidTopology {
            service: service.clone(),
            violation,
        }
    }

    /// The service the error was reported against
    pub fn service(&self) -> &ServiceName {
        match self {
            TopologyError::InvalidTopology { service, .. } => service,
        }
    }
}

/// Why a topology was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyViolation {
    #[error("service depends on itself on port {port}")]
    SelfEdge { port: u16 },

    #[error("edge {from} -> {to}:{port} references an undeclared service")]
    UnknownService {
        from: ServiceName,
        to: ServiceName,
        port: u16,
    },

    #[error("service is declared more than once")]
    DuplicateService,

    #[error("edge port must be > 0")]
    InvalidPort,
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;
