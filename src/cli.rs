//! CLI argument parsing for the logging sweep.
//!
//! The CLI is intentionally thin: two options that select the account/region
//! context, nothing else. All policy lives in the sweep itself.
use clap::Parser;

/// Credential profile used when none is given on the command line.
pub const DEFAULT_PROFILE: &str = "default";

/// Root CLI entrypoint for the sweep.
#[derive(Parser, Debug)]
#[command(
    name = "apigw-log-sweep",
    version,
    about = "Enable INFO-level CloudWatch execution logging on every API Gateway stage",
    after_help = "Examples:\n  apigw-log-sweep --region us-east-1\n  apigw-log-sweep --profile staging --region eu-west-1"
)]
pub struct Args {
    /// AWS credential profile name
    #[arg(short, long, value_name = "NAME", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// AWS region to sweep
    #[arg(short, long, value_name = "REGION")]
    pub region: String,
}
