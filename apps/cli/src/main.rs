//! Entitygraph CLI: crawl a business website, measure its AI visibility and
//! turn it into a knowledge-graph entity.
//!
//! Runs the crawl-fingerprint-publish pipeline, assesses notability and
//! persists every run to a local libSQL database.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
