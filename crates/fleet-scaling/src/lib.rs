//! Fleet Scaling - Size tags to compute allocations
//!
//! Services declare a symbolic size (`micro` ... `4xlarge`) and instance
//! bounds. This crate turns both into the concrete values the provisioning
//! engine schedules with.
//!
//! ## Key Concepts
//!
//! - **SizeTag**: closed, totally ordered enumeration of recognized sizes
//! - **ComputeAllocation**: cpu units and memory for one instance
//! - **ResolvedScaling**: allocation plus validated min/max instance counts
//!
//! A service with `max_instances == 0` is disabled: it is provisioned and
//! configured, but the engine never schedules an instance of it.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod mapper;
pub mod size;

// Re-exports
pub use error::{Result, ScalingError};
pub use mapper::{ResolvedScaling, ScalingProfileMapper};
pub use size::{ComputeAllocation, SizeTag};
