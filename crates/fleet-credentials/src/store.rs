//! Hand-off of token values to the external secret store

use crate::error::Result;
use crate::token::TokenRef;
use dashmap::DashMap;

/// External secret store that resolves references at deploy time
pub trait SecretStore: Send + Sync {
    /// Store a token value under its reference
    fn put(&self, reference: &TokenRef, value: &str) -> Result<()>;
}

/// In-memory secret store for development and tests
#[derive(Default)]
pub struct InMemorySecretStore {
    values: DashMap<TokenRef, String>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference the way the provisioning engine would
    pub fn resolve(&self, reference: &TokenRef) -> Option<String> {
        self.values.get(reference).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SecretStore for InMemorySecretStore {
    fn put(&self, reference: &TokenRef, value: &str) -> Result<()> {
        self.values.insert(reference.clone(), value.to_string());
        Ok(())
    }
}
