//! provisio - command-line reconciler
//!
//! - Grant or revoke project IAM roles with etag-guarded writes
//! - Reserve or release IPAM address blocks
//! - Dry-run by choice on every mutating command

use clap::Parser;

use provisio_cli::cli::{run, Cli};
use provisio_cli::logging;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.log_level());

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}
