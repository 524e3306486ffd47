//! One-shot sweep that enables INFO-level CloudWatch execution logging on
//! every API Gateway stage in one account/region.
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod gateway;
mod sigv4;
mod sweep;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_tracing();

    let credentials = config::resolve_credentials(&args.profile)?;
    tracing::info!(profile = %args.profile, region = %args.region, "starting logging sweep");

    let client = gateway::RestClient::new(&args.region, credentials);
    match sweep::run_sweep(&client, std::thread::sleep) {
        Ok(summary) => {
            tracing::info!(
                apis = summary.apis,
                stages = summary.stages,
                compliant = summary.compliant,
                remediated = summary.remediated,
                "sweep complete"
            );
            Ok(())
        }
        Err(err) => {
            // Any provider failure is fatal to the run: log once, no retry.
            tracing::error!(error = format!("{err:#}"), "sweep aborted");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
