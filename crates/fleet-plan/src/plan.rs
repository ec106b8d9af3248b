//! Planner output

use crate::error::Result;
use fleet_credentials::{TokenBinding, TokenRef, VerificationKey};
use fleet_scaling::ResolvedScaling;
use fleet_topology::NetworkPlan;
use fleet_types::{HealthCheck, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment variable carrying the public token verification key
pub const VERIFYING_KEY_ENV: &str = "FLEET_JWT_VERIFYING_KEY";

/// Everything the provisioning engine needs to run one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRuntimeConfig {
    pub service: ServiceName,

    pub port: u16,

    /// Plain environment, including one `<DEST>_URL` per dependency
    pub env: BTreeMap<String, String>,

    /// Env var -> token reference; only the secret store resolves these
    pub secrets: BTreeMap<String, TokenRef>,

    pub scaling: ResolvedScaling,

    pub health: HealthCheck,
}

impl ServiceRuntimeConfig {
    pub fn is_schedulable(&self) -> bool {
        self.scaling.schedulable
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn secret(&self, env: &str) -> Option<&TokenRef> {
        self.secrets.get(env)
    }
}

/// Result of one planning pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub network: NetworkPlan,

    pub services: BTreeMap<ServiceName, ServiceRuntimeConfig>,

    /// Which service receives which token reference
    pub bindings: Vec<TokenBinding>,

    pub verification_key: VerificationKey,
}

impl DeploymentPlan {
    pub fn service(&self, name: &str) -> Option<&ServiceRuntimeConfig> {
        self.services.get(name)
    }

    /// Services the engine schedules instances for
    pub fn schedulable(&self) -> impl Iterator<Item = &ServiceRuntimeConfig> {
        self.services.values().filter(|c| c.is_schedulable())
    }

    /// Services provisioned and configured but never scheduled
    pub fn disabled(&self) -> impl Iterator<Item = &ServiceRuntimeConfig> {
        self.services.values().filter(|c| !c.is_schedulable())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
