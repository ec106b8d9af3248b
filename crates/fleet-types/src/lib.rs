//! Fleet Types - Core types for the service fleet planner
//!
//! A fleet is a fixed set of backend services (gateway, auth, rest, graphql,
//! realtime, storage, imgproxy, meta) sharing one database and one signing
//! secret. This crate holds the static description of that fleet; every other
//! crate in the workspace depends only on these types.
//!
//! ## Architectural Boundaries
//!
//! - **fleet-topology** owns: dependency edges → network rules and endpoints
//! - **fleet-credentials** owns: the root secret and every derived token
//! - **fleet-scaling** owns: size tags → compute allocation, scaling bounds
//! - **fleet-redeploy** owns: change events → coalesced redeploy requests
//!
//! ## Key Concepts
//!
//! - **ServiceFleetSpec**: descriptors + dependency edges + trigger rules + tokens
//! - **ServiceDescriptor**: one service's port, env, secrets, probe, scaling
//! - **DependencyEdge**: "from may call to on port"
//! - **TriggerRule**: event pattern → set of services to redeploy
//! - **ChangeEvent**: an attribute set observed on an external change feed

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod events;
pub mod ids;
pub mod spec;
pub mod standard;

// Re-export main types
pub use events::{AttributeMatcher, ChangeEvent, EventPattern};
pub use ids::{EventId, ServiceName};
pub use spec::{
    DependencyEdge, HealthCheck, Probe, ScalingBounds, SecretRef, ServiceDescriptor,
    ServiceFleetSpec, SpecValidationError, TokenSpec, TriggerRule,
};
