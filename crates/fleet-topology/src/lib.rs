//! Fleet Topology - Network policy derivation for a service fleet
//!
//! Turns declared "service X may call service Y on port P" edges into:
//!
//! - **NetworkRule**s: one allow rule per distinct (source, destination, port)
//!   triple, however many edges declared it
//! - **EndpointBinding**s: one resolvable address per destination service,
//!   shared by every service that depends on it
//!
//! The deriver is a pure function of its inputs. Re-running it on the same
//! fleet yields the same rules and bindings; enumeration order is not part of
//! the contract.
//!
//! Call cycles between distinct services are legal (they describe steady-state
//! traffic, not bring-up order). Only self-edges and references to undeclared
//! services are rejected.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod graph;
pub mod plan;

// Re-exports
pub use error::{Result, TopologyError, TopologyViolation};
pub use graph::{EndpointConfig, TopologyGraph};
pub use plan::{EndpointBinding, NetworkPlan, NetworkRule};
