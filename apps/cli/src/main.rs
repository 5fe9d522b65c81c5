//! Content Viewer CLI: inspect a project's content collections.
//!
//! Discovers the collection definitions, loads entries, infers their schema,
//! and serves the results to an inspection panel.

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
