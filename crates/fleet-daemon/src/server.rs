//! Daemon lifecycle: plan once, then coordinate redeploys until stopped

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use crate::sink::LoggingSink;
use crate::source::feed_events;
use fleet_plan::{DeploymentPlan, DeploymentPlanner};
use fleet_redeploy::RedeployCoordinator;
use fleet_types::ServiceFleetSpec;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tracing::{error, info};

/// The fleet daemon
pub struct Daemon {
    config: DaemonConfig,
    spec: ServiceFleetSpec,
}

impl Daemon {
    /// Create a daemon, reading the fleet spec named by the config
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let spec = match config.fleet.spec_path.as_deref() {
            Some(path) => {
                let source = std::fs::read_to_string(path)?;
                let spec = ServiceFleetSpec::from_yaml_str(&source)?;
                info!(path, services = spec.services.len(), "Loaded fleet spec");
                spec
            }
            None => {
                info!("Using the standard fleet spec");
                ServiceFleetSpec::standard()
            }
        };
        Ok(Self::with_spec(config, spec))
    }

    pub fn with_spec(config: DaemonConfig, spec: ServiceFleetSpec) -> Self {
        Self { config, spec }
    }

    pub fn spec(&self) -> &ServiceFleetSpec {
        &self.spec
    }

    /// Run one planning pass and optionally write the plan out
    pub fn plan(&self) -> DaemonResult<DeploymentPlan> {
        let plan = DeploymentPlanner::new()
            .with_endpoint_config(self.config.fleet.endpoint_config())
            .plan(&self.spec)?;

        for service in plan.services.values() {
            info!(
                service = %service.service,
                port = service.port,
                size = %service.scaling.size,
                min = service.scaling.min_instances,
                max = service.scaling.max_instances,
                schedulable = service.is_schedulable(),
                secrets = service.secrets.len(),
                "Service planned"
            );
        }

        if let Some(path) = self.config.fleet.plan_output.as_deref() {
            std::fs::write(path, plan.to_json()?)?;
            info!(path, "Deployment plan written");
        }

        Ok(plan)
    }

    /// Plan, then feed change events from `events` into the coordinator
    ///
    /// Stops at end of input or on a shutdown signal; pending windows are
    /// flushed and delivered before returning.
    pub async fn run<R>(self, events: R) -> DaemonResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.plan()?;

        let sink = Arc::new(LoggingSink::new());
        let (handle, task) = RedeployCoordinator::spawn(
            self.spec.trigger_rules.clone(),
            self.config.coordinator.clone(),
            sink,
        );
        tokio::select! {
            result = feed_events(events, &handle) => {
                let submitted = result?;
                info!(submitted, "Change feed ended");
            }
            _ = shutdown_signal() => {}
        }

        handle.shutdown().await?;
        if let Err(e) = task.await {
            error!(error = %e, "Coordinator task failed");
        }

        let stats = handle.stats();
        info!(
            submitted = stats.submitted,
            matched = stats.matched,
            delivered = stats.delivered,
            undelivered = stats.undelivered,
            "Daemon stopped"
        );
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
