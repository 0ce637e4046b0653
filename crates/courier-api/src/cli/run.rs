//! `courier run`: wire the host and use the terminal as a channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tracing::{error, info};

use courier_core::agent::SessionOrchestrator;
use courier_core::channel::BoxChannel;
use courier_core::dispatch::{Dispatcher, OutboundDispatcher};
use courier_core::memory::ConsolidationPipeline;
use courier_core::message::{MessageBus, MessageProcessor};
use courier_core::session::SessionStore;
use courier_infra::engine::SubprocessEngine;
use courier_infra::filesystem::{FileMemoryRepository, memory_dir};
use courier_infra::llm::summarizer_from_env;

use crate::channel::{CliChannel, read_stdin};
use crate::state::AppState;

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Run the host until Ctrl+C, SIGTERM, or end of stdin.
///
/// End of stdin lets queued work finish before shutting down; a signal
/// closes the bus immediately (buffered inbound messages are still handled).
pub async fn run_host(state: AppState, json: bool) -> Result<()> {
    let summarizer = summarizer_from_env().context("consolidation summarizer is not configured")?;
    tokio::fs::create_dir_all(&state.workspace)
        .await
        .with_context(|| format!("failed to create workspace {}", state.workspace.display()))?;

    let bus = Arc::new(MessageBus::new());
    let pipeline = ConsolidationPipeline::new(
        FileMemoryRepository::new(memory_dir(&state.workspace)),
        summarizer,
        &state.config,
    );
    let orchestrator = Arc::new(SessionOrchestrator::new(
        state.config.clone(),
        state.workspace.clone(),
        Arc::clone(&bus),
        SessionStore::new(AppState::session_repository(&state.data_dir)),
        pipeline,
        SubprocessEngine::new(&state.config.engine),
    ));

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&bus), Arc::clone(&orchestrator)));
    let mut outbound = OutboundDispatcher::new(Arc::clone(&bus));
    outbound.register(BoxChannel::new(CliChannel::new(json)));

    let inbound_task = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.run().await }
    });
    let outbound_task = tokio::spawn(async move { outbound.run().await });

    if !json {
        eprintln!();
        eprintln!(
            "  {} Courier is listening on {} (model {})",
            style("⚡").bold(),
            style("cli:direct").cyan(),
            style(&state.config.model).yellow()
        );
        eprintln!(
            "  {}",
            style("Type a message, /help for commands, Ctrl+D or Ctrl+C to quit").dim()
        );
        eprintln!();
    }

    tokio::select! {
        result = read_stdin(Arc::clone(&bus)) => {
            if let Err(e) = result {
                error!(error = %e, "failed to read stdin");
            }
            wait_until_idle(&bus, &dispatcher).await;
        }
        _ = shutdown_signal() => {
            info!("shutdown requested");
        }
    }

    bus.close();
    inbound_task.await.context("dispatcher task failed")?;
    outbound_task.await.context("outbound task failed")?;
    orchestrator.close_all().await;
    info!("host stopped");
    Ok(())
}

/// Wait until nothing is queued, running, or waiting for delivery.
///
/// Two idle observations in a row are required so a message between being
/// popped and being dispatched is not mistaken for idleness.
async fn wait_until_idle<P: MessageProcessor>(bus: &MessageBus, dispatcher: &Dispatcher<P>) {
    let mut idle_polls = 0;
    while idle_polls < 2 {
        tokio::time::sleep(IDLE_POLL).await;
        let idle =
            bus.inbound_len() == 0 && dispatcher.in_flight() == 0 && bus.outbound_len() == 0;
        idle_polls = if idle { idle_polls + 1 } else { 0 };
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
