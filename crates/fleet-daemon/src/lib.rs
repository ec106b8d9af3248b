//! Fleet Daemon library
//!
//! This module provides the core components for `fleetd`:
//! - Layered configuration
//! - The planning pass at startup
//! - A JSON-lines change event source
//! - A logging redeploy sink
//! - Daemon lifecycle management

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod server;
pub mod sink;
pub mod source;

// Re-exports
pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use server::Daemon;
pub use sink::LoggingSink;
pub use source::feed_events;
