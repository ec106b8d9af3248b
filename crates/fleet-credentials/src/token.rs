//! Derived tokens and their compact encoding

use crate::error::{CredentialError, Result};
use crate::root::{SecretRoot, VerificationKey};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

const RESERVED_CLAIMS: [&str; 4] = ["role", "iss", "iat", "exp"];

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn eddsa() -> Self {
        Self {
            alg: "EdDSA".into(),
            typ: "JWT".into(),
        }
    }
}

/// Decoded token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub role: String,
    pub iss: String,

    /// Issued-at, unix seconds
    pub iat: i64,

    /// Expiry, unix seconds
    pub exp: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    pub(crate) fn new(
        role: &str,
        issuer: &str,
        issued_at: i64,
        expires_in: i64,
        extra: &Map<String, Value>,
    ) -> Result<Self> {
        if role.trim().is_empty() {
            return Err(CredentialError::EmptyRole);
        }
        if expires_in <= 0 {
            return Err(CredentialError::InvalidDuration {
                role: role.to_string(),
                expires_in,
            });
        }
        if let Some(claim) = RESERVED_CLAIMS.iter().find(|c| extra.contains_key(**c)) {
            return Err(CredentialError::ReservedClaim {
                role: role.to_string(),
                claim: claim.to_string(),
            });
        }

        let exp = issued_at
            .checked_add(expires_in)
            .ok_or_else(|| CredentialError::InvalidDuration {
                role: role.to_string(),
                expires_in,
            })?;

        Ok(Self {
            role: role.to_string(),
            iss: issuer.to_string(),
            iat: issued_at,
            exp,
            extra: extra.clone(),
        })
    }

    pub fn is_expired_at(&self, unix_seconds: i64) -> bool {
        unix_seconds >= self.exp
    }
}

/// Opaque reference to a derived token, resolved only by the secret store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenRef(String);

impl TokenRef {
    fn for_token(claims: &TokenClaims, compact: &str) -> Self {
        let digest = blake3::hash(compact.as_bytes());
        Self(format!(
            "secret://{}/{}/{}",
            claims.iss,
            claims.role,
            &digest.to_hex()[..16]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token signed by the root secret
///
/// The encoded value is a secret in its own right (a `service_role` token
/// bypasses row-level policies). It is only readable inside this crate and by
/// the secret store it is published to.
#[derive(Clone)]
pub struct DerivedToken {
    claims: TokenClaims,
    reference: TokenRef,
    compact: Zeroizing<String>,
}

impl DerivedToken {
    pub(crate) fn sign(root: &SecretRoot, claims: TokenClaims) -> Result<Self> {
        let header = encode_part(&Header::eddsa())?;
        let payload = encode_part(&claims)?;
        let signing_input = format!("{header}.{payload}");
        let signature = root.sign(signing_input.as_bytes());
        let compact = Zeroizing::new(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ));
        let reference = TokenRef::for_token(&claims, &compact);

        Ok(Self {
            claims,
            reference,
            compact,
        })
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn role(&self) -> &str {
        &self.claims.role
    }

    pub fn reference(&self) -> &TokenRef {
        &self.reference
    }

    pub(crate) fn compact(&self) -> &str {
        &self.compact
    }
}

impl std::fmt::Debug for DerivedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedToken")
            .field("claims", &self.claims)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Verify a compact token and decode its claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::MalformedToken(
                "expected three dot-separated parts".into(),
            ));
        };

        let signature = decode_bytes(signature)?;
        let signature = Signature::from_slice(&signature)
            .map_err(|e| CredentialError::MalformedToken(format!("signature: {e}")))?;

        let signing_input = &token[..header.len() + 1 + payload.len()];
        self.verify_signature(signing_input.as_bytes(), &signature)?;

        let header: Header = decode_part(header)?;
        if header.alg != "EdDSA" {
            return Err(CredentialError::MalformedToken(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        decode_part(payload)
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

fn decode_bytes(part: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| CredentialError::MalformedToken(e.to_string()))
}

fn decode_part<T: serde::de::DeserializeOwned>(part: &str) -> Result<T> {
    let bytes = decode_bytes(part)?;
    serde_json::from_slice(&bytes).map_err(|e| CredentialError::MalformedToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn claims(extra: Map<String, Value>) -> TokenClaims {
        TokenClaims::new("service_role", "app", 1_700_000_000, 3600, &extra).unwrap()
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = TokenClaims::new("service_role", "app", 0, 0, &Map::new()).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::InvalidDuration { expires_in: 0, .. }
        ));
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(matches!(
            TokenClaims::new("anon", "app", 0, -5, &Map::new()),
            Err(CredentialError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_reserved_extra_claim_rejected() {
        let mut extra = Map::new();
        extra.insert("exp".into(), Value::from(1));
        assert!(matches!(
            TokenClaims::new("anon", "app", 0, 60, &extra),
            Err(CredentialError::ReservedClaim { claim, .. }) if claim == "exp"
        ));
    }

    #[test]
    fn test_sign_then_verify() {
        let root = SecretRoot::generate();
        let mut extra = Map::new();
        extra.insert("ref".into(), Value::from("project-1"));
        let token = DerivedToken::sign(&root, claims(extra)).unwrap();

        let decoded = root.verification_key().verify(token.compact()).unwrap();
        assert_eq!(&decoded, token.claims());
        assert_eq!(decoded.exp, 1_700_003_600);
        assert_eq!(decoded.extra["ref"], "project-1");
    }

    #[test]
    fn test_other_root_rejects() {
        let token = DerivedToken::sign(&SecretRoot::generate(), claims(Map::new())).unwrap();
        let other = SecretRoot::generate();
        assert!(matches!(
            other.verification_key().verify(token.compact()),
            Err(CredentialError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_swapped_payload_rejected() {
        let root = SecretRoot::generate();
        let service = DerivedToken::sign(&root, claims(Map::new())).unwrap();
        let anon = DerivedToken::sign(
            &root,
            TokenClaims::new("anon", "app", 1_700_000_000, 3600, &Map::new()).unwrap(),
        )
        .unwrap();

        // anon header+payload with the service_role signature
        let anon_parts: Vec<&str> = anon.compact().split('.').collect();
        let service_parts: Vec<&str> = service.compact().split('.').collect();
        let forged = format!("{}.{}.{}", anon_parts[0], anon_parts[1], service_parts[2]);

        assert!(root.verification_key().verify(&forged).is_err());
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = DerivedToken::sign(&SecretRoot::generate(), claims(Map::new())).unwrap();
        let printed = format!("{token:?}");
        assert!(!printed.contains(token.compact()));
    }

    #[test]
    fn test_reference_names_issuer_and_role() {
        let token = DerivedToken::sign(&SecretRoot::generate(), claims(Map::new())).unwrap();
        assert!(token
            .reference()
            .as_str()
            .starts_with("secret://app/service_role/"));
    }

    proptest! {
        /// Altering any single claim byte invalidates the token.
        #[test]
        fn tampered_claims_never_verify(index in any::<prop::sample::Index>(), flip in 1u8..=255) {
            let root = SecretRoot::from_seed(Zeroizing::new([9u8; 32]));
            let mut extra = Map::new();
            extra.insert("tenant".into(), Value::from("acme"));
            let token = DerivedToken::sign(&root, claims(extra)).unwrap();

            let parts: Vec<&str> = token.compact().split('.').collect();
            let mut payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
            let at = index.index(payload.len());
            payload[at] ^= flip;
            let forged = format!(
                "{}.{}.{}",
                parts[0],
                URL_SAFE_NO_PAD.encode(&payload),
                parts[2]
            );

            prop_assert!(root.verification_key().verify(&forged).is_err());
        }
    }
}
