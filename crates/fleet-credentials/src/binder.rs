//! Credential binder: derivation, binding, publication

use crate::error::{CredentialError, Result};
use crate::root::{RotationDelegate, RotationTicket, SecretRoot, VerificationKey};
use crate::store::SecretStore;
use crate::token::{DerivedToken, TokenClaims, TokenRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fleet_types::{ServiceName, TokenSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};

static PROCESS_BINDER: OnceLock<CredentialBinder> = OnceLock::new();

/// Records that a service's configuration receives a token reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenBinding {
    pub service: ServiceName,
    pub role: String,
    pub token: TokenRef,
}

/// Sole owner of the root secret and sole producer of derived tokens
pub struct CredentialBinder {
    root: SecretRoot,

    /// Derivation inputs digest -> token
    derived: DashMap<String, DerivedToken>,

    /// Reference -> services bound to it
    bindings: DashMap<TokenRef, BTreeSet<ServiceName>>,
}

impl CredentialBinder {
    /// The process-wide binder, created with a fresh root on first access
    pub fn process() -> &'static CredentialBinder {
        PROCESS_BINDER.get_or_init(|| {
            let binder = Self::with_root(SecretRoot::generate());
            info!(
                root_fingerprint = %binder.root_fingerprint(),
                "Process root secret initialized"
            );
            binder
        })
    }

    /// A binder over an explicitly provided root
    pub fn with_root(root: SecretRoot) -> Self {
        Self {
            root,
            derived: DashMap::new(),
            bindings: DashMap::new(),
        }
    }

    pub fn verification_key(&self) -> VerificationKey {
        self.root.verification_key()
    }

    pub fn root_fingerprint(&self) -> String {
        self.root.fingerprint()
    }

    /// Derive a role-scoped token
    ///
    /// Identical inputs return the identical token for the lifetime of the
    /// binder, so repeated planning passes bind the same references.
    #[instrument(skip(self, extra_claims), fields(extra = extra_claims.len()))]
    pub fn derive_token(
        &self,
        role: &str,
        issuer: &str,
        expires_in: i64,
        extra_claims: &Map<String, Value>,
    ) -> Result<DerivedToken> {
        // validate before the cache so invalid input never hits a stale entry
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims::new(role, issuer, now, expires_in, extra_claims)?;
        let key = derivation_key(role, issuer, expires_in, extra_claims)?;

        match self.derived.entry(key) {
            Entry::Occupied(existing) => {
                debug!(role, issuer, "Reusing previously derived token");
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let token = DerivedToken::sign(&self.root, claims)?;
                debug!(role, issuer, reference = %token.reference(), "Derived token");
                slot.insert(token.clone());
                Ok(token)
            }
        }
    }

    /// Derive the token a fleet spec declares
    pub fn derive(&self, spec: &TokenSpec) -> Result<DerivedToken> {
        self.derive_token(&spec.role, &spec.issuer, spec.expires_in_secs, &spec.claims)
    }

    /// Bind a token to a service; performs no I/O
    pub fn bind(&self, service: &ServiceName, token: &DerivedToken) -> Result<TokenBinding> {
        if !self.owns(token.reference()) {
            return Err(CredentialError::UnknownToken(token.reference().to_string()));
        }

        self.bindings
            .entry(token.reference().clone())
            .or_default()
            .insert(service.clone());

        debug!(service = %service, role = token.role(), "Token bound");
        Ok(TokenBinding {
            service: service.clone(),
            role: token.role().to_string(),
            token: token.reference().clone(),
        })
    }

    /// Every recorded binding, sorted
    pub fn bindings(&self) -> Vec<TokenBinding> {
        let mut all: Vec<TokenBinding> = Vec::new();
        for entry in self.bindings.iter() {
            let role = self
                .derived
                .iter()
                .find(|t| t.reference() == entry.key())
                .map(|t| t.role().to_string())
                .unwrap_or_default();
            for service in entry.value() {
                all.push(TokenBinding {
                    service: service.clone(),
                    role: role.clone(),
                    token: entry.key().clone(),
                });
            }
        }
        all.sort();
        all
    }

    /// Services bound to a reference
    pub fn consumers(&self, reference: &TokenRef) -> BTreeSet<ServiceName> {
        self.bindings
            .get(reference)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Verify a compact token against this binder's root
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        self.verification_key().verify(token)
    }

    /// Hand every derived token value to the external secret store
    #[instrument(skip_all)]
    pub fn publish(&self, store: &dyn SecretStore) -> Result<usize> {
        let mut published = 0;
        for token in self.derived.iter() {
            store.put(token.reference(), token.compact())?;
            published += 1;
        }
        info!(published, "Token values published to secret store");
        Ok(published)
    }

    /// Ask the external collaborator to rotate the root
    ///
    /// The current root stays in place; tokens remain valid until the new
    /// root is announced and consumers are redeployed.
    pub fn request_rotation(
        &self,
        delegate: &dyn RotationDelegate,
        reason: &str,
    ) -> Result<RotationTicket> {
        let fingerprint = self.root_fingerprint();
        warn!(root_fingerprint = %fingerprint, reason, "Root secret rotation requested");
        delegate.request_rotation(&fingerprint, reason)
    }

    fn owns(&self, reference: &TokenRef) -> bool {
        self.derived.iter().any(|t| t.reference() == reference)
    }
}

fn derivation_key(
    role: &str,
    issuer: &str,
    expires_in: i64,
    extra_claims: &Map<String, Value>,
) -> Result<String> {
    // serde_json maps are key-ordered, so this encoding is canonical
    let inputs = serde_json::to_vec(&serde_json::json!({
        "role": role,
        "iss": issuer,
        "expires_in": expires_in,
        "claims": extra_claims,
    }))?;
    Ok(blake3::hash(&inputs).to_hex().to_string())
}
