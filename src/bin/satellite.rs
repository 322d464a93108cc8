//! satellite -- job-executing worker node.
//!
//! Usage:
//!   satellite [--config satellite.toml] [--port 7001] [run]
//!   satellite submit --addr 127.0.0.1:7001 --tool tool.Add --params '{"a":2,"b":3}'

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use satellite::client::JobClient;
use satellite::config::SatelliteConfig;
use satellite::tools::ToolCatalog;
use satellite::{Job, Satellite, ToolResolver};

#[derive(Debug, Parser)]
#[command(author, version, about = "Worker node that executes jobs with dynamically loaded tools")]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true, env = "SATELLITE_CONFIG", default_value = "satellite.toml")]
    config: PathBuf,

    /// Override the listen port from the config file.
    #[arg(long, global = true, env = "SATELLITE_PORT")]
    port: Option<u16>,

    /// Log level filter, e.g. info,debug,trace. `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "SATELLITE_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Accept and execute job requests (default).
    Run,
    /// Send one job to a running satellite and print the result.
    Submit(SubmitArgs),
}

#[derive(Debug, Args)]
struct SubmitArgs {
    /// Satellite address.
    #[arg(long)]
    addr: SocketAddr,
    /// Tool identifier.
    #[arg(long)]
    tool: String,
    /// Job parameters as JSON.
    #[arg(long, default_value = "null")]
    params: String,
    /// Seconds to wait for the result (at least 1).
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `submit` output stays clean on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Some(Command::Submit(args)) => submit(args),
        Some(Command::Run) | None => run(&cli),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = SatelliteConfig::load(&cli.config)?;
    config.apply_cli_overrides(cli.port);

    let source = config.code_source.build()?;
    let resolver = Arc::new(ToolResolver::new(source, ToolCatalog::with_builtins()));

    let satellite = Satellite::bind(&config.satellite.address(), resolver)?;
    info!(
        satellite = %config.satellite,
        coordinator = %config.server,
        "satellite starting"
    );
    satellite.serve();
    Ok(())
}

fn submit(args: &SubmitArgs) -> Result<()> {
    let parameters: serde_json::Value =
        serde_json::from_str(&args.params).context("--params is not valid JSON")?;
    let client = JobClient::new(args.addr).with_timeout(Duration::from_secs(args.timeout));

    match client.submit(&Job::new(args.tool.clone(), parameters))? {
        Some(result) => {
            println!("{result}");
            Ok(())
        }
        None => anyhow::bail!("satellite closed the connection without a result"),
    }
}
