//! The standard eight-service fleet
//!
//! Gateway in front, seven backend services behind it, one shared database
//! (provisioned externally, bootstrapped before any service connects) and one
//! signing secret.

use crate::{
    DependencyEdge, EventPattern, HealthCheck, ServiceDescriptor, ServiceFleetSpec, TokenSpec,
    TriggerRule,
};

/// Token lifetime for the long-lived API keys (ten years)
const API_KEY_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

impl ServiceFleetSpec {
    /// The standard fleet: gateway, auth, rest, graphql, realtime, storage, imgproxy, meta
    pub fn standard() -> Self {
        let services = vec![
            ServiceDescriptor::new("gateway", 8000)
                .with_size("medium")
                .with_scaling(2, 6)
                .with_health(HealthCheck::command(["kong", "health"]))
                .with_env("KONG_DATABASE", "off")
                .with_secret("ANON_KEY", "anon")
                .with_secret("SERVICE_KEY", "service_role"),
            ServiceDescriptor::new("auth", 9999)
                .with_scaling(1, 4)
                .with_health(HealthCheck::http("/health"))
                .with_env("GOTRUE_API_PORT", "9999")
                .with_env("GOTRUE_DB_DRIVER", "postgres")
                .verifying_tokens(),
            ServiceDescriptor::new("rest", 3000)
                .with_size("medium")
                .with_scaling(2, 8)
                .with_env("PGRST_DB_SCHEMAS", "public,storage,graphql_public")
                .with_env("PGRST_DB_ANON_ROLE", "anon")
                .verifying_tokens(),
            ServiceDescriptor::new("graphql", 3001)
                .with_size("micro")
                .with_scaling(0, 0)
                .with_health(HealthCheck::http("/health"))
                .verifying_tokens(),
            ServiceDescriptor::new("realtime", 4000)
                .with_scaling(1, 4)
                .with_health(HealthCheck::http("/api/health"))
                .with_env("SECURE_CHANNELS", "true")
                .verifying_tokens(),
            ServiceDescriptor::new("storage", 5000)
                .with_scaling(1, 4)
                .with_health(HealthCheck::http("/status"))
                .with_env("STORAGE_BACKEND", "s3")
                .with_env("FILE_SIZE_LIMIT", "52428800")
                .with_secret("ANON_KEY", "anon")
                .with_secret("SERVICE_KEY", "service_role"),
            ServiceDescriptor::new("imgproxy", 5001)
                .with_size("large")
                .with_scaling(1, 2)
                .with_health(HealthCheck::command(["imgproxy", "health"]))
                .with_env("IMGPROXY_BIND", ":5001")
                .with_env("IMGPROXY_USE_ETAG", "true"),
            ServiceDescriptor::new("meta", 8080)
                .with_size("micro")
                .with_health(HealthCheck::http("/health"))
                .with_env("PG_META_PORT", "8080"),
        ];

        let edges = vec![
            DependencyEdge::new("gateway", "auth", 9999).labeled("gateway routes /auth/v1"),
            DependencyEdge::new("gateway", "rest", 3000).labeled("gateway routes /rest/v1"),
            DependencyEdge::new("gateway", "graphql", 3001).labeled("gateway routes /graphql/v1"),
            DependencyEdge::new("gateway", "realtime", 4000)
                .labeled("gateway routes /realtime/v1"),
            DependencyEdge::new("gateway", "storage", 5000).labeled("gateway routes /storage/v1"),
            DependencyEdge::new("gateway", "meta", 8080).labeled("gateway routes /pg"),
            DependencyEdge::new("storage", "rest", 3000).labeled("storage resolves object policies"),
            DependencyEdge::new("storage", "imgproxy", 5001).labeled("storage image transforms"),
            DependencyEdge::new("graphql", "rest", 3000).labeled("graphql resolves through rest"),
            DependencyEdge::new("realtime", "auth", 9999).labeled("realtime validates sessions"),
        ];

        let trigger_rules = vec![
            TriggerRule::new(
                "auth-provider-settings",
                EventPattern::new()
                    .exact("source", "settings")
                    .exact("field", "authProvider"),
                ["auth"],
            ),
            TriggerRule::new(
                "auth-smtp-settings",
                EventPattern::new()
                    .exact("source", "settings")
                    .prefix("field", "smtp"),
                ["auth"],
            ),
            TriggerRule::new(
                "storage-settings",
                EventPattern::new()
                    .exact("source", "settings")
                    .prefix("field", "storage."),
                ["storage", "imgproxy"],
            ),
            TriggerRule::new(
                "signing-secret-rotated",
                EventPattern::new()
                    .exact("source", "secrets")
                    .exact("secret", "jwt"),
                ["gateway", "auth", "rest", "graphql", "realtime", "storage"],
            ),
        ];

        let tokens = vec![
            TokenSpec::new("anon", "fleet", API_KEY_LIFETIME_SECS),
            TokenSpec::new("service_role", "fleet", API_KEY_LIFETIME_SECS),
        ];

        Self {
            services,
            edges,
            trigger_rules,
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fleet_is_valid() {
        let spec = ServiceFleetSpec::standard();
        spec.validate().unwrap();
        assert_eq!(spec.services.len(), 8);
    }

    #[test]
    fn test_rotation_rule_covers_every_token_consumer() {
        let spec = ServiceFleetSpec::standard();
        let rotation = spec
            .trigger_rules
            .iter()
            .find(|r| r.name == "signing-secret-rotated")
            .unwrap();

        for service in spec.services.iter().filter(|s| s.consumes_tokens()) {
            assert!(
                rotation.services.contains(&service.name),
                "{} consumes tokens but is not redeployed on rotation",
                service.name
            );
        }
    }

    #[test]
    fn test_graphql_is_declared_but_disabled() {
        let spec = ServiceFleetSpec::standard();
        let graphql = spec.service("graphql").unwrap();
        assert_eq!(graphql.scaling.max_instances, 0);
    }
}
