//! Argument parsing and dispatch

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, Context};
use crate::config::{Config, ConfigLocation};
use crate::error::CliResult;
use crate::logging::LogLevel;

/// provisio - reconcile IAM grants and IP reservations
#[derive(Parser, Debug)]
#[command(name = "provisio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to PROVISIO_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More diagnostics on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only on stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the outcome as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Grant or revoke project IAM roles
    Iam(commands::iam::IamArgs),

    /// Reserve or release IPAM address blocks
    Ipam(commands::ipam::IpamArgs),

    /// Inspect role bundles
    Bundles(commands::bundles::BundlesArgs),
}

impl Cli {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_flags(self.verbose, self.quiet)
    }
}

/// Load configuration once and dispatch the command.
pub async fn run(cli: Cli) -> CliResult<()> {
    let location = ConfigLocation::resolve(cli.config.as_deref())?;
    let config = Config::load(&location)?;
    tracing::debug!(path = %location.path.display(), "configuration loaded");

    let ctx = Context::new(config, cli.json);
    match cli.command {
        Commands::Iam(args) => commands::iam::execute(args, &ctx).await,
        Commands::Ipam(args) => commands::ipam::execute(args, &ctx).await,
        Commands::Bundles(args) => commands::bundles::execute(args, &ctx),
    }
}
