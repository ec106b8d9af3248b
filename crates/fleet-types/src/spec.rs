//! Service fleet specifications
//!
//! A ServiceFleetSpec is the static input of every planning pass: what runs,
//! who may call whom, which tokens exist, and which change events force a
//! redeploy. It is created once from configuration and never mutated.

use crate::{EventPattern, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Complete static description of a service fleet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceFleetSpec {
    /// Service descriptors, unique by name
    pub services: Vec<ServiceDescriptor>,

    /// Declared call permissions
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,

    /// Change-event patterns that force redeploys
    #[serde(default)]
    pub trigger_rules: Vec<TriggerRule>,

    /// Role-scoped tokens derived from the root secret
    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
}

impl ServiceFleetSpec {
    /// Parse a fleet spec from YAML
    pub fn from_yaml_str(source: &str) -> Result<Self, SpecValidationError> {
        serde_yaml::from_str(source).map_err(|e| SpecValidationError::Parse(e.to_string()))
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name.as_str() == name)
    }

    /// Names of all declared services
    pub fn service_names(&self) -> BTreeSet<ServiceName> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// Look up a token spec by role
    pub fn token(&self, role: &str) -> Option<&TokenSpec> {
        self.tokens.iter().find(|t| t.role == role)
    }

    /// Validate the spec
    ///
    /// Dependency edges are not checked here; the topology deriver owns them.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.services.is_empty() {
            return Err(SpecValidationError::EmptyFleet);
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !seen.insert(service.name.as_str()) {
                return Err(SpecValidationError::DuplicateService(service.name.clone()));
            }
        }

        let mut roles = HashSet::new();
        for token in &self.tokens {
            if token.role.trim().is_empty() {
                return Err(SpecValidationError::EmptyTokenRole);
            }
            if !roles.insert(token.role.as_str()) {
                return Err(SpecValidationError::DuplicateToken(token.role.clone()));
            }
        }

        for service in &self.services {
            for secret in &service.secrets {
                if !roles.contains(secret.token.as_str()) {
                    return Err(SpecValidationError::UnknownToken {
                        service: service.name.clone(),
                        role: secret.token.clone(),
                    });
                }
            }
        }

        for rule in &self.trigger_rules {
            if rule.services.is_empty() {
                return Err(SpecValidationError::EmptyTriggerRule(rule.name.clone()));
            }
            if let Some(unknown) = rule.services.iter().find(|s| !seen.contains(s.as_str())) {
                return Err(SpecValidationError::UnknownService {
                    context: format!("trigger rule '{}'", rule.name),
                    name: unknown.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Static description of one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique service name
    pub name: ServiceName,

    /// Listening port
    pub port: u16,

    /// Environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Token references, in declaration order
    #[serde(default)]
    pub secrets: Vec<SecretRef>,

    /// Health probe handed to the hosting platform
    #[serde(default)]
    pub health: HealthCheck,

    /// Instance count bounds
    #[serde(default)]
    pub scaling: ScalingBounds,

    /// Symbolic size tag, resolved by the scaling mapper
    #[serde(default = "default_size")]
    pub size: String,

    /// Receives the token verification key without holding any token
    #[serde(default)]
    pub verifies_tokens: bool,
}

impl ServiceDescriptor {
    /// Create a descriptor with defaults
    pub fn new(name: impl Into<ServiceName>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            env: HashMap::new(),
            secrets: Vec::new(),
            health: HealthCheck::default(),
            scaling: ScalingBounds::default(),
            size: default_size(),
            verifies_tokens: false,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_secret(mut self, env: impl Into<String>, token: impl Into<String>) -> Self {
        self.secrets.push(SecretRef {
            env: env.into(),
            token: token.into(),
        });
        self
    }

    pub fn with_health(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }

    pub fn with_scaling(mut self, min: i64, max: i64) -> Self {
        self.scaling.min_instances = min;
        self.scaling.max_instances = max;
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn verifying_tokens(mut self) -> Self {
        self.verifies_tokens = true;
        self
    }

    /// Whether this service needs the token verification key
    pub fn consumes_tokens(&self) -> bool {
        self.verifies_tokens || !self.secrets.is_empty()
    }

    /// Validate the descriptor in isolation
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.name.as_str().trim().is_empty() {
            return Err(SpecValidationError::EmptyServiceName);
        }

        if self.port == 0 {
            return Err(SpecValidationError::InvalidPort(self.name.clone()));
        }

        let mut envs = HashSet::new();
        for secret in &self.secrets {
            if !envs.insert(secret.env.as_str()) || self.env.contains_key(&secret.env) {
                return Err(SpecValidationError::DuplicateSecretEnv {
                    service: self.name.clone(),
                    env: secret.env.clone(),
                });
            }
        }

        self.health
            .validate()
            .map_err(|reason| SpecValidationError::InvalidHealthCheck {
                service: self.name.clone(),
                reason,
            })
    }
}

fn default_size() -> String {
    "small".to_string()
}

/// Named reference from a service into the credential binder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Environment variable that receives the token reference
    pub env: String,

    /// Role of the token spec being referenced
    pub token: String,
}

/// Health probe specification (transport is implemented by the platform)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// What to probe
    pub probe: Probe,

    /// Seconds between probes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Seconds before a probe counts as failed
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failures before the instance is unhealthy
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Grace period after start during which failures are ignored
    #[serde(default)]
    pub start_period_secs: u64,
}

impl HealthCheck {
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            probe: Probe::Http { path: path.into() },
            ..Self::default()
        }
    }

    pub fn command<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            probe: Probe::Command {
                command: command.into_iter().map(Into::into).collect(),
            },
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval must be > 0".into());
        }
        if self.timeout_secs == 0 || self.timeout_secs > self.interval_secs {
            return Err(format!(
                "timeout {}s must be > 0 and <= interval {}s",
                self.timeout_secs, self.interval_secs
            ));
        }
        if self.retries == 0 {
            return Err("retries must be >= 1".into());
        }
        if let Probe::Command { command } = &self.probe {
            if command.is_empty() {
                return Err("probe command cannot be empty".into());
            }
        }
        Ok(())
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            probe: Probe::Tcp,
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
            start_period_secs: 0,
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    5
}

fn default_retries() -> u32 {
    3
}

/// Health probe kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Probe {
    /// Run a command inside the container; exit code 0 is healthy
    Command { command: Vec<String> },

    /// HTTP GET against the service port
    Http { path: String },

    /// TCP connect to the service port
    Tcp,
}

/// Instance count bounds
///
/// Signed so that malformed configuration reaches the scaling mapper and is
/// rejected there rather than failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    pub min_instances: i64,
    pub max_instances: i64,

    /// CPU utilization percentage the autoscaler tracks
    #[serde(default = "default_target_cpu")]
    pub target_cpu_utilization: u8,
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 1,
            target_cpu_utilization: default_target_cpu(),
        }
    }
}

fn default_target_cpu() -> u8 {
    50
}

/// A role-scoped token to derive from the root secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpec {
    /// Role claim, unique within the fleet
    pub role: String,

    /// Issuer claim
    pub issuer: String,

    /// Lifetime in seconds; must be positive
    pub expires_in_secs: i64,

    /// Additional claims
    #[serde(default)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl TokenSpec {
    pub fn new(role: impl Into<String>, issuer: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            role: role.into(),
            issuer: issuer.into(),
            expires_in_secs,
            claims: serde_json::Map::new(),
        }
    }
}

/// "from must reach to on port"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: ServiceName,
    pub to: ServiceName,
    pub port: u16,

    /// Human-readable reason carried into the derived rule
    #[serde(default)]
    pub label: Option<String>,
}

impl DependencyEdge {
    pub fn new(from: impl Into<ServiceName>, to: impl Into<ServiceName>, port: u16) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            port,
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Change-event pattern → services to redeploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    /// Rule name for logs
    pub name: String,

    /// Pattern matched against incoming change events
    pub pattern: EventPattern,

    /// Services redeployed when the pattern matches
    pub services: BTreeSet<ServiceName>,
}

impl TriggerRule {
    pub fn new<I, S>(name: impl Into<String>, pattern: EventPattern, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceName>,
    {
        Self {
            name: name.into(),
            pattern,
            services: services.into_iter().map(Into::into).collect(),
        }
    }
}

/// Spec validation errors
#[derive(Debug, thiserror::Error)]
pub enum SpecValidationError {
    #[error("Fleet must declare at least one service")]
    EmptyFleet,

    #[error("Service name cannot be empty")]
    EmptyServiceName,

    #[error("Duplicate service: {0}")]
    DuplicateService(ServiceName),

    #[error("Invalid port for service {0}: port must be > 0")]
    InvalidPort(ServiceName),

    #[error("Unknown service '{name}' referenced by {context}")]
    UnknownService { context: String, name: ServiceName },

    #[error("Trigger rule '{0}' affects no services")]
    EmptyTriggerRule(String),

    #[error("Token role cannot be empty")]
    EmptyTokenRole,

    #[error("Duplicate token role: {0}")]
    DuplicateToken(String),

    #[error("Service {service} references unknown token role '{role}'")]
    UnknownToken { service: ServiceName, role: String },

    #[error("Service {service} binds environment variable {env} more than once")]
    DuplicateSecretEnv { service: ServiceName, env: String },

    #[error("Invalid health check for service {service}: {reason}")]
    InvalidHealthCheck { service: ServiceName, reason: String },

    #[error("Failed to parse fleet spec: {0}")]
    Parse(String),
}
