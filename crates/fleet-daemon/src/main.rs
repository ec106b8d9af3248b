//! fleetd - service fleet planner and redeploy coordinator
//!
//! The fleet daemon:
//! - Plans network rules, endpoints, scaling and credentials for the fleet
//! - Reads change events as JSON lines on stdin
//! - Coalesces them into redeploy requests per affected service set

use clap::Parser;
use fleet_daemon::{Daemon, DaemonConfig, DaemonResult};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fleet daemon CLI
#[derive(Parser)]
#[command(name = "fleetd")]
#[command(about = "Service fleet planner and redeploy coordinator", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLEET_CONFIG")]
    config: Option<String>,

    /// Fleet spec (YAML); overrides the config file
    #[arg(short, long, env = "FLEET_SPEC")]
    spec: Option<String>,

    /// Print the deployment plan as JSON and exit
    #[arg(long)]
    plan_only: bool,

    /// Log level
    #[arg(long, env = "FLEET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "FLEET_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(spec) = cli.spec {
        config.fleet.spec_path = Some(spec);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        domain = %config.fleet.domain,
        "Starting fleetd"
    );

    let daemon = Daemon::new(config)?;

    if cli.plan_only {
        let plan = daemon.plan()?;
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    daemon.run(BufReader::new(tokio::io::stdin())).await
}
