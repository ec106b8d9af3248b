//! Scaling profile mapper

use crate::error::{Result, ScalingError};
use crate::size::{ComputeAllocation, SizeTag};
use fleet_types::{ScalingBounds, ServiceDescriptor, ServiceName};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scaling a service is provisioned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedScaling {
    pub size: SizeTag,

    pub compute: ComputeAllocation,

    pub min_instances: u32,

    pub max_instances: u32,

    /// Autoscaling target, percent
    pub target_cpu_utilization: u8,

    /// False for disabled services (`max_instances == 0`)
    pub schedulable: bool,
}

/// Maps declared sizes and bounds to concrete scaling
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalingProfileMapper;

impl ScalingProfileMapper {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a raw size tag into its compute allocation
    pub fn resolve(&self, size_tag: &str) -> Result<ComputeAllocation> {
        Ok(size_tag.parse::<SizeTag>()?.allocation())
    }

    pub fn resolve_tag(&self, tag: SizeTag) -> ComputeAllocation {
        tag.allocation()
    }

    /// Check instance bounds for a service
    ///
    /// `max == 0` is accepted: the service is disabled, not misconfigured.
    pub fn validate_bounds(&self, service: &ServiceName, bounds: &ScalingBounds) -> Result<(u32, u32)> {
        let invalid = || ScalingError::InvalidScalingBounds {
            service: service.clone(),
            min: bounds.min_instances,
            max: bounds.max_instances,
        };

        if bounds.min_instances > bounds.max_instances {
            return Err(invalid());
        }
        let min = u32::try_from(bounds.min_instances).map_err(|_| invalid())?;
        let max = u32::try_from(bounds.max_instances).map_err(|_| invalid())?;

        if !(1..=100).contains(&bounds.target_cpu_utilization) {
            return Err(ScalingError::InvalidTargetUtilization {
                service: service.clone(),
                value: bounds.target_cpu_utilization,
            });
        }

        Ok((min, max))
    }

    /// Resolve size and bounds for one service
    pub fn resolve_service(&self, descriptor: &ServiceDescriptor) -> Result<ResolvedScaling> {
        let size = descriptor.size.parse::<SizeTag>().map_err(|_| {
            ScalingError::UnknownServiceSizeTag {
                service: descriptor.name.clone(),
                tag: descriptor.size.clone(),
            }
        })?;
        let (min_instances, max_instances) =
            self.validate_bounds(&descriptor.name, &descriptor.scaling)?;

        let resolved = ResolvedScaling {
            size,
            compute: size.allocation(),
            min_instances,
            max_instances,
            target_cpu_utilization: descriptor.scaling.target_cpu_utilization,
            schedulable: max_instances > 0,
        };

        debug!(
            service = %descriptor.name,
            size = %size,
            min = min_instances,
            max = max_instances,
            schedulable = resolved.schedulable,
            "Resolved scaling"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bounds(min: i64, max: i64) -> ScalingBounds {
        ScalingBounds {
            min_instances: min,
            max_instances: max,
            ..ScalingBounds::default()
        }
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let mapper = ScalingProfileMapper::new();
        assert_eq!(
            mapper.resolve("medium").unwrap(),
            ComputeAllocation::new(1024, 2048)
        );
        assert_eq!(
            mapper.resolve("huge"),
            Err(ScalingError::UnknownSizeTag("huge".into()))
        );
    }

    #[test]
    fn test_bounds_validation() {
        let mapper = ScalingProfileMapper::new();
        let name = ServiceName::new("rest");

        assert_eq!(mapper.validate_bounds(&name, &bounds(1, 3)).unwrap(), (1, 3));
        assert_eq!(mapper.validate_bounds(&name, &bounds(0, 0)).unwrap(), (0, 0));
        assert!(matches!(
            mapper.validate_bounds(&name, &bounds(3, 1)),
            Err(ScalingError::InvalidScalingBounds { min: 3, max: 1, .. })
        ));
        assert!(matches!(
            mapper.validate_bounds(&name, &bounds(-1, 2)),
            Err(ScalingError::InvalidScalingBounds { min: -1, .. })
        ));
    }

    #[test]
    fn test_zero_target_utilization_rejected() {
        let mapper = ScalingProfileMapper::new();
        let mut b = bounds(1, 2);
        b.target_cpu_utilization = 0;
        assert!(matches!(
            mapper.validate_bounds(&ServiceName::new("rest"), &b),
            Err(ScalingError::InvalidTargetUtilization { value: 0, .. })
        ));
    }

    #[test]
    fn test_disabled_service_is_not_schedulable() {
        let descriptor = ServiceDescriptor::new("graphql", 3001)
            .with_size("micro")
            .with_scaling(0, 0);
        let resolved = ScalingProfileMapper::new()
            .resolve_service(&descriptor)
            .unwrap();
        assert!(!resolved.schedulable);
        assert_eq!(resolved.compute, ComputeAllocation::new(256, 512));
    }

    #[test]
    fn test_unknown_tag_names_service() {
        let descriptor = ServiceDescriptor::new("meta", 8080).with_size("tiny");
        let err = ScalingProfileMapper::new()
            .resolve_service(&descriptor)
            .unwrap_err();
        assert_eq!(err.service().map(|s| s.as_str()), Some("meta"));
        assert!(err.to_string().contains("tiny"));
    }

    proptest! {
        /// Larger tags never get less cpu or memory.
        #[test]
        fn resolve_is_monotone(a in 0usize..7, b in 0usize..7) {
            let (small, large) = (SizeTag::ALL[a.min(b)], SizeTag::ALL[a.max(b)]);
            prop_assert!(small <= large);
            prop_assert!(large.allocation().covers(&small.allocation()));
        }

        /// Bounds are accepted exactly when 0 <= min <= max.
        #[test]
        fn bounds_accepted_iff_ordered_and_non_negative(min in -5i64..20, max in -5i64..20) {
            let result = ScalingProfileMapper::new()
                .validate_bounds(&ServiceName::new("svc"), &bounds(min, max));
            prop_assert_eq!(result.is_ok(), 0 <= min && min <= max);
        }
    }
}
