//! Derived network plan

use fleet_types::ServiceName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Allow rule: source may open connections to destination on port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkRule {
    pub source: ServiceName,
    pub destination: ServiceName,
    pub port: u16,

    /// Reason carried from the first edge that produced this rule
    pub label: String,
}

impl NetworkRule {
    /// The (source, destination, port) identity of the rule
    pub fn triple(&self) -> (&ServiceName, &ServiceName, u16) {
        (&self.source, &self.destination, self.port)
    }
}

/// Resolvable address of a destination service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointBinding {
    pub service: ServiceName,
    pub host: String,
    pub port: u16,
    pub url: String,
}

impl EndpointBinding {
    /// Environment variable a dependent service receives this endpoint under
    pub fn env_var(&self) -> String {
        format!("{}_URL", self.service.env_prefix())
    }
}

/// Output of the topology deriver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlan {
    pub(crate) rules: Vec<NetworkRule>,
    pub(crate) endpoints: BTreeMap<ServiceName, EndpointBinding>,
    pub(crate) dependencies: BTreeMap<ServiceName, BTreeSet<ServiceName>>,
}

impl NetworkPlan {
    /// All derived rules
    pub fn rules(&self) -> &[NetworkRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Find the rule for a triple, if one was derived
    pub fn rule(&self, source: &str, destination: &str, port: u16) -> Option<&NetworkRule> {
        self.rules.iter().find(|r| {
            r.source.as_str() == source && r.destination.as_str() == destination && r.port == port
        })
    }

    /// Rules admitting traffic into a service
    pub fn ingress(&self, destination: &str) -> impl Iterator<Item = &NetworkRule> {
        let destination = destination.to_string();
        self.rules
            .iter()
            .filter(move |r| r.destination.as_str() == destination)
    }

    /// Every endpoint binding, keyed by destination service
    pub fn endpoints(&self) -> &BTreeMap<ServiceName, EndpointBinding> {
        &self.endpoints
    }

    pub fn endpoint(&self, service: &str) -> Option<&EndpointBinding> {
        self.endpoints.get(service)
    }

    /// Endpoints a service depends on
    pub fn endpoints_for(&self, source: &str) -> Vec<&EndpointBinding> {
        self.dependencies
            .get(source)
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|target| self.endpoints.get(target))
                    .collect()
            })
            .unwrap_or_default()
    }
}
