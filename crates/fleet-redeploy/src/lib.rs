//! Fleet Redeploy - Change events to coalesced redeploy requests
//!
//! The coordinator watches a live stream of [`ChangeEvent`]s, matches them
//! against the fleet's trigger rules and emits one [`RedeployRequest`] per
//! affected service set per coalescing window.
//!
//! ## Architectural Boundaries
//!
//! - Owns: pending windows, delivery retries, acknowledgment tracking
//! - Does NOT own: provisioning (the [`RedeploySink`] behind the channel does)
//!
//! ## Key Concepts
//!
//! - **ServiceSet**: the affected set a rule names; the coalescing key
//! - **Coalescing window**: events for one set inside the window merge
//! - **Delivery**: at-least-once; resends reuse the request id
//!
//! Sets that overlap but differ are never merged. A set whose previous request
//! is still being delivered keeps collecting events until that delivery
//! settles.
//!
//! [`ChangeEvent`]: fleet_types::ChangeEvent

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod request;
pub mod sink;
pub mod stats;

// Re-exports
pub use config::{CoordinatorConfig, RetryConfig};
pub use coordinator::{CoordinatorHandle, RedeployCoordinator};
pub use error::{CoordinatorError, DeliveryError, Result};
pub use request::{RedeployRequest, ServiceSet};
pub use sink::{ChannelSink, Delivery, RedeploySink};
pub use stats::{CoordinatorStats, StatsSnapshot};
