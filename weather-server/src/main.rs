//! Binary crate for the `weather` service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup
//! - Exposing the aggregator over HTTP

use clap::Parser;

mod cli;
mod http;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logging::init(&cmd.log_level);
    cmd.run().await
}
