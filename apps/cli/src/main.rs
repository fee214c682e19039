//! dailydigest CLI — daily news digest reader.
//!
//! Fetches a dated digest of stories, progressively enriches it with lead
//! images and full bodies, and keeps a small LRU-cached snapshot on disk.

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
