//! Fleet Plan - One planning pass over a ServiceFleetSpec
//!
//! The planner runs the topology deriver, the scaling mapper and the
//! credential binder over the same spec and merges their outputs into one
//! [`ServiceRuntimeConfig`] per service. Planning is all-or-nothing: any
//! error aborts the pass and no plan is returned.
//!
//! ## Architectural Boundaries
//!
//! - **fleet-topology**: network rules and endpoint bindings
//! - **fleet-scaling**: compute allocation and instance bounds
//! - **fleet-credentials**: derived tokens, handed out as references only
//! - **fleet-redeploy**: not involved; it consumes the fleet spec's trigger rules
//!   independently
//!
//! ## Key Concepts
//!
//! - **DeploymentPlan**: what the provisioning engine applies
//! - **ServiceRuntimeConfig**: env vars, token references, scaling, probe
//! - **PlanErrorKind**: planning failure kinds, whatever their origin

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod plan;
pub mod planner;

// Re-exports
pub use error::{EnvSource, PlanError, PlanErrorKind, Result};
pub use plan::{DeploymentPlan, ServiceRuntimeConfig, VERIFYING_KEY_ENV};
pub use planner::DeploymentPlanner;
