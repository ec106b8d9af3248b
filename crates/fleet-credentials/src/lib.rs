//! Fleet Credentials - Role-scoped tokens from one root signing secret
//!
//! The [`CredentialBinder`] is the only component that ever holds the
//! [`SecretRoot`]. It derives signed tokens (`anon`, `service_role`, ...) and
//! hands the rest of the system opaque [`TokenRef`]s. Services receive those
//! references in their runtime configuration; the external secret store
//! resolves them into values at deploy time.
//!
//! ## Lifecycle
//!
//! - The process root is generated on first access and never regenerated.
//! - Rotation is requested through a [`RotationDelegate`]; the binder never
//!   replaces its own root.
//! - Re-deriving a token with identical inputs returns the identical token.
//!
//! ## Token format
//!
//! Compact `header.claims.signature`, each part base64url without padding,
//! signed with Ed25519 (`alg: EdDSA`). Consumers verify with the public
//! [`VerificationKey`]; the signing half never leaves this crate.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod binder;
pub mod error;
pub mod root;
pub mod store;
pub mod token;

// Re-exports
pub use binder::{CredentialBinder, TokenBinding};
pub use error::{CredentialError, Result};
pub use root::{RotationDelegate, RotationTicket, SecretRoot, VerificationKey};
pub use store::{InMemorySecretStore, SecretStore};
pub use token::{DerivedToken, TokenClaims, TokenRef};
