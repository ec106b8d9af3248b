//! Topology graph and policy deriver

use crate::error::{Result, TopologyError, TopologyViolation};
use crate::plan::{EndpointBinding, NetworkPlan, NetworkRule};
use fleet_types::{DependencyEdge, ServiceDescriptor, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

/// How endpoint addresses are formed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Internal DNS domain services resolve under (`auth.<domain>`)
    #[serde(default = "default_domain")]
    pub domain: String,

    /// URL scheme for inter-service calls
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            scheme: default_scheme(),
        }
    }
}

fn default_domain() -> String {
    "fleet.internal".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

/// Declared services of a fleet, ready to derive network policy from
pub struct TopologyGraph<'a> {
    services: HashMap<&'a str, &'a ServiceDescriptor>,
    config: EndpointConfig,
}

impl<'a> TopologyGraph<'a> {
    /// Index the declared services
    pub fn new(services: &'a [ServiceDescriptor], config: EndpointConfig) -> Result<Self> {
        let mut index = HashMap::with_capacity(services.len());
        for service in services {
            if index.insert(service.name.as_str(), service).is_some() {
                return Err(TopologyError::invalid(
                    &service.name,
                    TopologyViolation::DuplicateService,
                ));
            }
        }

        Ok(Self {
            services: index,
            config,
        })
    }

    /// Derive deduplicated rules and shared endpoint bindings from edges
    ///
    /// Fails on the first self-edge or unknown service; no partial plan is
    /// returned.
    #[instrument(skip_all, fields(services = self.services.len(), edges = edges.len()))]
    pub fn derive(&self, edges: &[DependencyEdge]) -> Result<NetworkPlan> {
        // (source, destination) -> port -> label
        let mut adjacency: BTreeMap<(&ServiceName, &ServiceName), BTreeMap<u16, String>> =
            BTreeMap::new();

        for edge in edges {
            self.check_edge(edge)?;

            let ports = adjacency.entry((&edge.from, &edge.to)).or_default();
            match ports.entry(edge.port) {
                Entry::Vacant(slot) => {
                    slot.insert(label_for(edge));
                }
                Entry::Occupied(existing) => {
                    debug!(
                        from = %edge.from,
                        to = %edge.to,
                        port = edge.port,
                        kept_label = %existing.get(),
                        "Duplicate dependency edge folded into existing rule"
                    );
                }
            }
        }

        let mut plan = NetworkPlan::default();
        for ((source, destination), ports) in adjacency {
            for (port, label) in ports {
                plan.rules.push(NetworkRule {
                    source: source.clone(),
                    destination: destination.clone(),
                    port,
                    label,
                });
            }

            plan.dependencies
                .entry(source.clone())
                .or_default()
                .insert(destination.clone());

            if !plan.endpoints.contains_key(destination) {
                let binding = self.bind(destination)?;
                plan.endpoints.insert(destination.clone(), binding);
            }
        }

        debug!(
            rules = plan.rules.len(),
            endpoints = plan.endpoints.len(),
            "Network plan derived"
        );

        Ok(plan)
    }

    fn check_edge(&self, edge: &DependencyEdge) -> Result<()> {
        if edge.from == edge.to {
            return Err(TopologyError::invalid(
                &edge.from,
                TopologyViolation::SelfEdge { port: edge.port },
            ));
        }

        for name in [&edge.from, &edge.to] {
            if !self.services.contains_key(name.as_str()) {
                return Err(TopologyError::invalid(
                    name,
                    TopologyViolation::UnknownService {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        port: edge.port,
                    },
                ));
            }
        }

        if edge.port == 0 {
            return Err(TopologyError::invalid(
                &edge.from,
                TopologyViolation::InvalidPort,
            ));
        }

        Ok(())
    }

    fn bind(&self, service: &ServiceName) -> Result<EndpointBinding> {
        let descriptor = self.services.get(service.as_str()).ok_or_else(|| {
            TopologyError::invalid(
                service,
                TopologyViolation::UnknownService {
                    from: service.clone(),
                    to: service.clone(),
                    port: 0,
                },
            )
        })?;

        let host = format!("{}.{}", service, self.config.domain);
        let url = format!("{}://{}:{}", self.config.scheme, host, descriptor.port);
        Ok(EndpointBinding {
            service: service.clone(),
            host,
            port: descriptor.port,
            url,
        })
    }
}

fn label_for(edge: &DependencyEdge) -> String {
    edge.label
        .clone()
        .unwrap_or_else(|| format!("{} calls {} on port {}", edge.from, edge.to, edge.port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn services(names: &[(&str, u16)]) -> Vec<ServiceDescriptor> {
        names
            .iter()
            .map(|(name, port)| ServiceDescriptor::new(*name, *port))
            .collect()
    }

    fn small_fleet() -> Vec<ServiceDescriptor> {
        services(&[("gateway", 8000), ("auth", 9999), ("rest", 3000)])
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let plan = graph
            .derive(&[
                DependencyEdge::new("gateway", "auth", 9999),
                DependencyEdge::new("gateway", "rest", 3000),
                DependencyEdge::new("gateway", "auth", 9999),
            ])
            .unwrap();

        assert_eq!(plan.rule_count(), 2);
        assert!(plan.rule("gateway", "auth", 9999).is_some());
        assert!(plan.rule("gateway", "rest", 3000).is_some());

        let bound: HashSet<&str> = plan.endpoints().keys().map(|k| k.as_str()).collect();
        assert_eq!(bound, HashSet::from(["auth", "rest"]));

        let gateway: HashSet<&str> = plan
            .endpoints_for("gateway")
            .iter()
            .map(|e| e.url.as_str())
            .collect();
        assert_eq!(
            gateway,
            HashSet::from([
                "http://auth.fleet.internal:9999",
                "http://rest.fleet.internal:3000"
            ])
        );
    }

    #[test]
    fn test_first_label_wins() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let plan = graph
            .derive(&[
                DependencyEdge::new("gateway", "auth", 9999).labeled("routes /auth/v1"),
                DependencyEdge::new("gateway", "auth", 9999).labeled("admin api"),
            ])
            .unwrap();

        assert_eq!(plan.rule_count(), 1);
        assert_eq!(
            plan.rule("gateway", "auth", 9999).unwrap().label,
            "routes /auth/v1"
        );
    }

    #[test]
    fn test_distinct_ports_are_distinct_rules() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let plan = graph
            .derive(&[
                DependencyEdge::new("gateway", "auth", 9999),
                DependencyEdge::new("gateway", "auth", 9100),
            ])
            .unwrap();

        assert_eq!(plan.rule_count(), 2);
        assert_eq!(plan.endpoints().len(), 1);
    }

    #[test]
    fn test_self_edge_rejected() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let err = graph
            .derive(&[DependencyEdge::new("auth", "auth", 9999)])
            .unwrap_err();

        assert_eq!(err.service().as_str(), "auth");
        assert!(matches!(
            err,
            TopologyError::InvalidTopology {
                violation: TopologyViolation::SelfEdge { port: 9999 },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_service_rejected() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let err = graph
            .derive(&[
                DependencyEdge::new("gateway", "auth", 9999),
                DependencyEdge::new("gateway", "storage", 5000),
            ])
            .unwrap_err();

        assert_eq!(err.service().as_str(), "storage");
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let fleet = services(&[("auth", 9999), ("auth", 9998)]);
        assert!(TopologyGraph::new(&fleet, EndpointConfig::default()).is_err());
    }

    #[test]
    fn test_mutual_calls_are_legal() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let plan = graph
            .derive(&[
                DependencyEdge::new("auth", "rest", 3000),
                DependencyEdge::new("rest", "auth", 9999),
                DependencyEdge::new("gateway", "auth", 9999),
            ])
            .unwrap();

        assert_eq!(plan.rule_count(), 3);
        assert_eq!(plan.ingress("auth").count(), 2);
    }

    #[test]
    fn test_custom_endpoint_domain() {
        let fleet = small_fleet();
        let config = EndpointConfig {
            domain: "svc.cluster.local".into(),
            scheme: "https".into(),
        };
        let graph = TopologyGraph::new(&fleet, config).unwrap();
        let plan = graph
            .derive(&[DependencyEdge::new("gateway", "rest", 3000)])
            .unwrap();

        let rest = plan.endpoint("rest").unwrap();
        assert_eq!(rest.url, "https://rest.svc.cluster.local:3000");
        assert_eq!(rest.env_var(), "REST_URL");
    }

    #[test]
    fn test_rederivation_is_stable() {
        let fleet = small_fleet();
        let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();
        let edges = [
            DependencyEdge::new("gateway", "rest", 3000),
            DependencyEdge::new("gateway", "auth", 9999),
            DependencyEdge::new("rest", "auth", 9999),
        ];

        let first = graph.derive(&edges).unwrap();
        let second = graph.derive(&edges).unwrap();

        let a: HashSet<_> = first.rules().iter().collect();
        let b: HashSet<_> = second.rules().iter().collect();
        assert_eq!(a, b);
        assert_eq!(first.endpoints(), second.endpoints());
    }

    const NAMES: [&str; 4] = ["gateway", "auth", "rest", "storage"];

    fn arb_edge() -> impl Strategy<Value = DependencyEdge> {
        (0..NAMES.len(), 1..NAMES.len(), prop_oneof![Just(3000u16), Just(9999u16), Just(5000u16)])
            .prop_map(|(from, offset, port)| {
                let to = (from + offset) % NAMES.len();
                DependencyEdge::new(NAMES[from], NAMES[to], port)
            })
    }

    proptest! {
        /// Rule count equals the number of distinct triples, however many duplicates are declared.
        #[test]
        fn rule_count_matches_distinct_triples(
            edges in prop::collection::vec(arb_edge(), 0..40),
            repeats in 1usize..4,
        ) {
            let fleet = services(&[("gateway", 8000), ("auth", 9999), ("rest", 3000), ("storage", 5000)]);
            let graph = TopologyGraph::new(&fleet, EndpointConfig::default()).unwrap();

            let duplicated: Vec<DependencyEdge> = edges
                .iter()
                .cloned()
                .cycle()
                .take(edges.len() * repeats)
                .collect();
            let plan = graph.derive(&duplicated).unwrap();

            let distinct: HashSet<(String, String, u16)> = edges
                .iter()
                .map(|e| (e.from.to_string(), e.to.to_string(), e.port))
                .collect();
            let destinations: HashSet<String> = edges.iter().map(|e| e.to.to_string()).collect();

            prop_assert_eq!(plan.rule_count(), distinct.len());
            prop_assert_eq!(plan.endpoints().len(), destinations.len());
        }
    }
}
