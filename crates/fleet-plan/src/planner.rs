//! Deployment planner

use crate::error::{EnvSource, PlanError, Result};
use crate::plan::{DeploymentPlan, ServiceRuntimeConfig, VERIFYING_KEY_ENV};
use fleet_credentials::{CredentialBinder, DerivedToken, VerificationKey};
use fleet_scaling::{ResolvedScaling, ScalingProfileMapper};
use fleet_topology::{EndpointConfig, NetworkPlan, TopologyGraph};
use fleet_types::{ServiceDescriptor, ServiceFleetSpec};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Runs topology, scaling and credentials over one fleet spec
pub struct DeploymentPlanner<'b> {
    binder: &'b CredentialBinder,
    endpoints: EndpointConfig,
    scaling: ScalingProfileMapper,
}

impl DeploymentPlanner<'static> {
    /// Planner bound to the process-wide credential binder
    pub fn new() -> Self {
        Self::with_binder(CredentialBinder::process())
    }
}

impl Default for DeploymentPlanner<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'b> DeploymentPlanner<'b> {
    pub fn with_binder(binder: &'b CredentialBinder) -> Self {
        Self {
            binder,
            endpoints: EndpointConfig::default(),
            scaling: ScalingProfileMapper::new(),
        }
    }

    pub fn with_endpoint_config(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Plan the whole fleet or nothing
    ///
    /// Every fallible step runs before the first token binding is recorded,
    /// so a failed pass leaves no bindings behind. An env var claimed by two
    /// sources (declared env, secret, `<DEST>_URL`, verifying key) fails the
    /// pass.
    #[instrument(skip_all, fields(services = spec.services.len(), edges = spec.edges.len()))]
    pub fn plan(&self, spec: &ServiceFleetSpec) -> Result<DeploymentPlan> {
        spec.validate()?;

        let network = TopologyGraph::new(&spec.services, self.endpoints.clone())?
            .derive(&spec.edges)?;

        let scaling = spec
            .services
            .iter()
            .map(|descriptor| self.scaling.resolve_service(descriptor))
            .collect::<std::result::Result<Vec<ResolvedScaling>, _>>()?;

        let tokens = spec
            .tokens
            .iter()
            .map(|token| {
                self.binder
                    .derive(token)
                    .map(|derived| (token.role.clone(), derived))
            })
            .collect::<std::result::Result<BTreeMap<String, DerivedToken>, _>>()?;

        let verification_key = self.binder.verification_key();
        let mut services = BTreeMap::new();
        let mut pending = Vec::new();

        for (descriptor, scaling) in spec.services.iter().zip(scaling) {
            let config = self.runtime_config(descriptor, &network, scaling, &verification_key)?;
            for secret in &descriptor.secrets {
                // presence is guaranteed by spec validation
                if let Some(token) = tokens.get(&secret.token) {
                    pending.push((descriptor.name.clone(), secret.env.clone(), token));
                }
            }
            services.insert(descriptor.name.clone(), config);
        }

        let mut bindings = Vec::with_capacity(pending.len());
        for (service, env, token) in pending {
            let binding = self.binder.bind(&service, token)?;
            if let Some(config) = services.get_mut(&service) {
                config.secrets.insert(env, binding.token.clone());
            }
            bindings.push(binding);
        }

        let plan = DeploymentPlan {
            network,
            services,
            bindings,
            verification_key,
        };

        info!(
            rules = plan.network.rule_count(),
            endpoints = plan.network.endpoints().len(),
            schedulable = plan.schedulable().count(),
            disabled = plan.disabled().count(),
            tokens = tokens.len(),
            "Deployment plan ready"
        );
        Ok(plan)
    }

    /// Assemble one service's env; every variable has exactly one source
    fn runtime_config(
        &self,
        descriptor: &ServiceDescriptor,
        network: &NetworkPlan,
        scaling: ResolvedScaling,
        verification_key: &VerificationKey,
    ) -> Result<ServiceRuntimeConfig> {
        let mut sources: BTreeMap<String, EnvSource> = BTreeMap::new();
        let mut env: BTreeMap<String, String> = BTreeMap::new();

        for (key, value) in &descriptor.env {
            claim(&mut sources, descriptor, key, EnvSource::Declared)?;
            env.insert(key.clone(), value.clone());
        }

        for secret in &descriptor.secrets {
            claim(&mut sources, descriptor, &secret.env, EnvSource::Secret)?;
        }

        for endpoint in network.endpoints_for(descriptor.name.as_str()) {
            let key = endpoint.env_var();
            claim(&mut sources, descriptor, &key, EnvSource::Endpoint)?;
            env.insert(key, endpoint.url.clone());
        }

        if descriptor.consumes_tokens() {
            claim(&mut sources, descriptor, VERIFYING_KEY_ENV, EnvSource::VerifyingKey)?;
            env.insert(VERIFYING_KEY_ENV.to_string(), verification_key.to_base64());
        }

        debug!(service = %descriptor.name, env = env.len(), "Runtime env assembled");

        Ok(ServiceRuntimeConfig {
            service: descriptor.name.clone(),
            port: descriptor.port,
            env,
            secrets: BTreeMap::new(),
            scaling,
            health: descriptor.health.clone(),
        })
    }
}

fn claim(
    sources: &mut BTreeMap<String, EnvSource>,
    descriptor: &ServiceDescriptor,
    key: &str,
    source: EnvSource,
) -> Result<()> {
    match sources.entry(key.to_string()) {
        Entry::Vacant(slot) => {
            slot.insert(source);
            Ok(())
        }
        Entry::Occupied(existing) => Err(PlanError::EnvCollision {
            service: descriptor.name.clone(),
            env: key.to_string(),
            first: *existing.get(),
            second: source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanErrorKind;
    use fleet_credentials::SecretRoot;
    use fleet_types::{DependencyEdge, TokenSpec};

    fn binder() -> CredentialBinder {
        CredentialBinder::with_root(SecretRoot::generate())
    }

    fn spec(services: Vec<ServiceDescriptor>) -> ServiceFleetSpec {
        ServiceFleetSpec {
            services,
            edges: vec![DependencyEdge::new("gateway", "auth", 9999)],
            trigger_rules: Vec::new(),
            tokens: vec![TokenSpec::new("anon", "app", 3600)],
        }
    }

    #[test]
    fn test_failed_pass_records_no_bindings() {
        let binder = binder();
        let spec = spec(vec![
            ServiceDescriptor::new("gateway", 8000).with_secret("ANON_KEY", "anon"),
            ServiceDescriptor::new("auth", 9999).with_size("gigantic"),
        ]);

        let err = DeploymentPlanner::with_binder(&binder)
            .plan(&spec)
            .unwrap_err();

        assert_eq!(err.kind(), PlanErrorKind::UnknownSizeTag);
        assert!(binder.bindings().is_empty());
    }

    fn collision(err: PlanError) -> (String, String, EnvSource, EnvSource) {
        assert_eq!(err.kind(), PlanErrorKind::InvalidTopology);
        match err {
            PlanError::EnvCollision {
                service,
                env,
                first,
                second,
            } => (service.to_string(), env, first, second),
            other => panic!("expected env collision, got {other}"),
        }
    }

    #[test]
    fn test_declared_env_clashing_with_endpoint_fails() {
        let binder = binder();
        let spec = spec(vec![
            ServiceDescriptor::new("gateway", 8000).with_env("AUTH_URL", "http://override:1"),
            ServiceDescriptor::new("auth", 9999),
        ]);

        let err = DeploymentPlanner::with_binder(&binder).plan(&spec).unwrap_err();
        assert_eq!(
            collision(err),
            (
                "gateway".to_string(),
                "AUTH_URL".to_string(),
                EnvSource::Declared,
                EnvSource::Endpoint
            )
        );
    }

    #[test]
    fn test_secret_env_clashing_with_endpoint_fails() {
        let binder = binder();
        let spec = spec(vec![
            ServiceDescriptor::new("gateway", 8000).with_secret("AUTH_URL", "anon"),
            ServiceDescriptor::new("auth", 9999),
        ]);

        let err = DeploymentPlanner::with_binder(&binder).plan(&spec).unwrap_err();
        let (service, env, first, second) = collision(err);
        assert_eq!((service.as_str(), env.as_str()), ("gateway", "AUTH_URL"));
        assert_eq!((first, second), (EnvSource::Secret, EnvSource::Endpoint));
        assert!(binder.bindings().is_empty());
    }

    #[test]
    fn test_declared_verifying_key_is_rejected() {
        let binder = binder();
        let spec = spec(vec![
            ServiceDescriptor::new("gateway", 8000)
                .with_secret("ANON_KEY", "anon")
                .with_env(VERIFYING_KEY_ENV, "not-the-key"),
            ServiceDescriptor::new("auth", 9999),
        ]);

        let err = DeploymentPlanner::with_binder(&binder).plan(&spec).unwrap_err();
        let (_, env, first, second) = collision(err);
        assert_eq!(env, VERIFYING_KEY_ENV);
        assert_eq!((first, second), (EnvSource::Declared, EnvSource::VerifyingKey));
    }

    #[test]
    fn test_endpoints_sharing_env_name_fail() {
        let binder = binder();
        let spec = ServiceFleetSpec {
            services: vec![
                ServiceDescriptor::new("gateway", 8000),
                ServiceDescriptor::new("storage-api", 5000),
                ServiceDescriptor::new("storage_api", 5001),
            ],
            edges: vec![
                DependencyEdge::new("gateway", "storage-api", 5000),
                DependencyEdge::new("gateway", "storage_api", 5001),
            ],
            trigger_rules: Vec::new(),
            tokens: Vec::new(),
        };

        let err = DeploymentPlanner::with_binder(&binder).plan(&spec).unwrap_err();
        let (service, env, first, second) = collision(err);
        assert_eq!((service.as_str(), env.as_str()), ("gateway", "STORAGE_API_URL"));
        assert_eq!((first, second), (EnvSource::Endpoint, EnvSource::Endpoint));
    }

    #[test]
    fn test_verifying_key_only_for_token_consumers() {
        let binder = binder();
        let spec = spec(vec![
            ServiceDescriptor::new("gateway", 8000).with_secret("ANON_KEY", "anon"),
            ServiceDescriptor::new("auth", 9999),
        ]);

        let plan = DeploymentPlanner::with_binder(&binder).plan(&spec).unwrap();
        let key = binder.verification_key().to_base64();

        assert_eq!(
            plan.service("gateway").unwrap().env_var(VERIFYING_KEY_ENV),
            Some(key.as_str())
        );
        assert_eq!(plan.service("auth").unwrap().env_var(VERIFYING_KEY_ENV), None);
    }
}
