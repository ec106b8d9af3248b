//! Root signing secret and its public half

use crate::error::{CredentialError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The single key every role-scoped token derives from
///
/// Never serialized, never printed. Only the crate can sign with it.
pub struct SecretRoot {
    signing_key: SigningKey,
}

impl SecretRoot {
    /// Generate a fresh root from OS entropy
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut seed[..]);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Rebuild a root from seed material held by the external secret store
    pub fn from_seed(seed: Zeroizing<[u8; 32]>) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Public half, safe to hand to any service
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey(self.signing_key.verifying_key())
    }

    /// Short stable identifier of this root, derived from its public half
    pub fn fingerprint(&self) -> String {
        self.verification_key().fingerprint()
    }
}

impl std::fmt::Debug for SecretRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRoot")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Public verification key for derived tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationKey(VerifyingKey);

impl VerificationKey {
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| CredentialError::MalformedToken(format!("verification key: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CredentialError::MalformedToken("verification key must be 32 bytes".into())
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| CredentialError::MalformedToken(format!("verification key: {e}")))
    }

    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.to_bytes())
    }

    pub fn fingerprint(&self) -> String {
        let digest = blake3::hash(&self.0.to_bytes());
        digest.to_hex()[..16].to_string()
    }

    pub(crate) fn verify_signature(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.0
            .verify(message, signature)
            .map_err(|_| CredentialError::SignatureMismatch)
    }
}

impl std::fmt::Display for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl Serialize for VerificationKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for VerificationKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Handle returned by the external secret-rotation collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationTicket {
    pub id: String,
    pub root_fingerprint: String,
}

/// External collaborator that performs root rotation
///
/// Rotation invalidates every token derived from the current root, so it is
/// never performed in-process. The collaborator provisions a new root out of
/// band and announces it on the change feed, which the redeploy coordinator
/// turns into redeploys of every token consumer.
pub trait RotationDelegate: Send + Sync {
    fn request_rotation(&self, root_fingerprint: &str, reason: &str) -> Result<RotationTicket>;
}
