//! Daemon configuration
//!
//! Layered as built-in defaults, then an optional config file, then
//! `FLEET_`-prefixed environment variables (nested keys use `__`,
//! e.g. `FLEET_COORDINATOR__WINDOW_SECS=10`).

use fleet_redeploy::CoordinatorConfig;
use fleet_topology::EndpointConfig;
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Fleet spec and endpoint naming
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Redeploy coalescing window and delivery retries
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the fleet spec comes from and how endpoints are named
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// YAML fleet spec; the built-in standard fleet when unset
    #[serde(default)]
    pub spec_path: Option<String>,

    /// Write the deployment plan as JSON to this path after planning
    #[serde(default)]
    pub plan_output: Option<String>,

    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            spec_path: None,
            plan_output: None,
            domain: default_domain(),
            scheme: default_scheme(),
        }
    }
}

impl FleetConfig {
    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            domain: self.domain.clone(),
            scheme: self.scheme.clone(),
        }
    }
}

fn default_domain() -> String {
    EndpointConfig::default().domain
}

fn default_scheme() -> String {
    EndpointConfig::default().scheme
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FLEET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
