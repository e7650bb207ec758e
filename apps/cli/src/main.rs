//! Outreach CLI: find faculty whose research matches a requester profile.
//!
//! Collects candidate records from a faculty directory, enriches them with
//! web context, ranks them against a CV and writes outreach drafts.

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
