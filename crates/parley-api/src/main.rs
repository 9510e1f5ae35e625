//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up tracing and configuration, then dispatches
//! to the command handler.

mod cli;
mod console;

use clap::Parser;

use cli::run::RunOptions;
use cli::{Cli, Commands, Settings};
use parley_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let settings = Settings::load(&cli).await;

    let result = match cli.command {
        Commands::Run {
            model,
            room,
            agent,
            user,
        } => {
            cli::run::run(
                settings,
                RunOptions {
                    model,
                    room,
                    agent,
                    user,
                },
            )
            .await
        }
        Commands::Budget => cli::budget::show_budget(&settings, cli.json).await,
        Commands::Checkpoint { model } => {
            cli::checkpoint::show_checkpoint(&settings, model, cli.json).await
        }
    };

    if let Err(err) = &result {
        tracing::error!(error = %err, "parley exited with an error");
    }
    shutdown_tracing();
    result
}
