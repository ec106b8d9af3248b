//! Credential error types

use thiserror::Error;

/// Credential binder errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid duration for token role '{role}': expires_in must be > 0, got {expires_in}")]
    InvalidDuration { role: String, expires_in: i64 },

    #[error("Token role cannot be empty")]
    EmptyRole,

    #[error("Claim '{claim}' is reserved and cannot be set as an extra claim on role '{role}'")]
    ReservedClaim { role: String, claim: String },

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature does not verify")]
    SignatureMismatch,

    #[error("Token {0} was not derived by this binder")]
    UnknownToken(String),

    #[error("Secret store error: {0}")]
    SecretStore(String),

    #[error("Rotation request failed: {0}")]
    Rotation(String),

    #[error("Claim encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;
