//! Courier CLI entry point.
//!
//! Binary name: `courier`
//!
//! Parses CLI arguments, sets up tracing, loads configuration and storage,
//! then dispatches to the command handler or runs the host.

mod channel;
mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, MemoryCommand, SessionCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    courier_observe::tracing_setup::init_tracing(cli.log_directive(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    courier_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "courier", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Run => cli::run::run_host(state, cli.json).await?,

        Commands::Session { action } => match action {
            SessionCommand::List => cli::session::list_sessions(&state, cli.json).await?,
            SessionCommand::Show { key } => {
                cli::session::show_session(&state, &key, cli.json).await?;
            }
            SessionCommand::Clear { key, force } => {
                cli::session::clear_session(&state, &key, force, cli.json).await?;
            }
        },

        Commands::Memory { action } => match action {
            MemoryCommand::Show => cli::memory::show_memory(&state, cli.json).await?,
            MemoryCommand::History { last } => {
                cli::memory::show_history(&state, last, cli.json).await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
