//! gangwayd — the gangway daemon.
//!
//! Runs next to a registry agent on each node and keeps the agent's
//! service set converged onto the tasks the scheduler runs on this node.
//!
//! # Usage
//!
//! ```text
//! gangwayd --marathon http://127.0.0.1:8080 --consul http://127.0.0.1:8500
//! gangwayd --marathon http://m1:8080,http://m2:8080 --resync-interval 2m
//! gangwayd --dry-run --log-level debug
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gangway_bridge::{Bridge, Supervisor};
use gangway_consul::ConsulAdapter;
use gangway_core::{config::parse_duration, Config};
use gangway_marathon::MarathonAdapter;

#[derive(Debug, Parser)]
#[command(
    name = "gangwayd",
    version,
    about = "Automatically registers and deregisters scheduler tasks as services in a local registry agent"
)]
struct Cli {
    /// Address and port of the Consul agent.
    #[arg(long, short = 'c', default_value = "http://127.0.0.1:8500")]
    consul: String,

    /// URL of the Marathon instance. Comma-separate multiple instances
    /// in an HA setup: http://addr1:8080,http://addr2:8080
    #[arg(long, short = 'm', default_value = "http://127.0.0.1:8080")]
    marathon: String,

    /// Time between full resyncs, used to catch dangling instances.
    /// Valid units are "ns", "us" ("µs"), "ms", "s", "m", "h".
    #[arg(long, short = 'i', default_value = "5m", value_parser = parse_duration)]
    resync_interval: Duration,

    /// Do not perform actual registration/deregistration, just log
    /// intents.
    #[arg(long, short = 'd')]
    dry_run: bool,

    /// Logging level.
    #[arg(
        long,
        short = 'l',
        default_value = "info",
        value_parser = ["debug", "info", "warn", "error", "fatal"],
    )]
    log_level: String,

    /// Emit log output without timestamps or colors, for syslog-fed
    /// collection.
    #[arg(long, short = 's')]
    syslog: bool,

    /// Force colored log output.
    #[arg(long, short = 'r')]
    force_colors: bool,
}

fn init_logging(level: &str, syslog: bool, force_colors: bool) {
    // tracing has no fatal level; errors are as fatal as it gets.
    let directive = if level == "fatal" { "error" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive));

    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    if syslog {
        // Syslog collectors stamp their own timestamps.
        fmt.without_time().with_ansi(false).init();
    } else if force_colors {
        fmt.with_ansi(true).init();
    } else {
        fmt.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.syslog, cli.force_colors);

    let config = Config {
        marathon_urls: Config::split_urls(&cli.marathon),
        consul_url: cli.consul,
        resync_interval: cli.resync_interval,
        dry_run: cli.dry_run,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        scheduler = %config.marathon_urls.join(","),
        registry = %config.consul_url,
        resync_interval = ?config.resync_interval,
        dry_run = config.dry_run,
        "starting gangway service registrator"
    );

    let scheduler = Arc::new(MarathonAdapter::new(config.marathon_urls.clone())?);
    let registry = Arc::new(ConsulAdapter::new(&config.consul_url, config.dry_run)?);
    let bridge = Arc::new(Bridge::new(scheduler, registry.clone()));
    let supervisor = Supervisor::new(bridge, registry, config.resync_interval);

    tokio::select! {
        _ = supervisor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!("gangway stopped");
    Ok(())
}
