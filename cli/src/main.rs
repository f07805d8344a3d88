//! Entry-point for the `defsync` binary.
use anyhow::Context;
use clap::Parser;
use defsync_cli::Cli;
use defsync_cli::run_main;

fn main() -> anyhow::Result<()> {
    // Environment must be complete before clap reads its `env` fallbacks, and
    // before any runtime threads exist.
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err).context("failed to load .env");
    }
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_main(cli))
}
