//! `parley run` -- start the agent with a console room.
//!
//! Startup order: measure memory, pick a model, place its parameters, resume
//! the checkpoint, replay missed history, then hand stdin lines to the
//! dispatcher until EOF or Ctrl+C.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use parley_core::dispatcher::{DispatchError, Dispatcher};
use parley_core::gate::ReplayGate;
use parley_core::model::ParameterHost;
use parley_core::placement;
use parley_core::queue::{Delivery, Inbox, event_queue};
use parley_core::replay::seed_from_history;
use parley_core::transport::Transport;
use parley_infra::file_store::FileContextStore;
use parley_infra::model::RemoteModel;

use super::{Settings, human_bytes, size_model};
use crate::console::ConsoleTransport;

pub struct RunOptions {
    pub model: Option<String>,
    pub room: String,
    pub agent: String,
    pub user: String,
}

pub async fn run(settings: Settings, options: RunOptions) -> anyhow::Result<()> {
    let config = settings.config;

    let sizing = size_model(&config, options.model.as_deref()).await?;
    tracing::info!(
        budget = sizing.budget,
        model = %sizing.model.name,
        accelerator = sizing.stats.has_accelerator(),
        "memory budget computed"
    );

    let model = RemoteModel::connect(&config.model_url, &sizing.model.name)
        .await
        .with_context(|| format!("failed to load {} from {}", sizing.model.name, config.model_url))?;

    let tree = model.parameters().await?;
    let placement = placement::assign(&model, &tree, sizing.budget, sizing.stats.has_accelerator())
        .await
        .context("parameter placement failed")?;

    let model = Arc::new(model);
    let store = Arc::new(FileContextStore::new(&settings.data_dir));
    let transport = Arc::new(ConsoleTransport::new(&options.agent, &options.user, &options.room));

    let gate = ReplayGate::new();
    let (inbox, queue) = event_queue(transport.user_id().clone(), gate.clone());

    let dispatcher = Dispatcher::restore(
        Arc::clone(&model),
        Arc::clone(&store),
        Arc::clone(&transport),
        queue,
        gate,
        &config,
    )
    .await?;

    let replayed = seed_from_history(transport.as_ref(), dispatcher.watermarks(), &inbox).await?;
    tracing::info!(rooms = replayed.rooms, events = replayed.enqueued, "history replay queued");

    println!();
    println!(
        "  {} {} is listening in {} ({}, {} on accelerator)",
        console::style("⚡").bold(),
        console::style(&options.agent).cyan().bold(),
        console::style(&options.room).bold(),
        console::style(&sizing.model.name).green(),
        if placement.relocated {
            human_bytes(placement.total_bytes)
        } else {
            "nothing".to_string()
        }
    );
    println!("  {}", console::style("Type a message and press Enter. Ctrl+D or Ctrl+C to stop.").dim());
    println!();

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(dispatcher.run(shutdown.clone()));

    let lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    relay(lines, inbox, transport.as_ref(), worker, shutdown, shutdown_signal()).await?;

    println!("\n  Agent stopped.");
    Ok(())
}

/// Feed operator lines to the dispatcher until the worker finishes.
///
/// EOF closes the inbox so the queue drains; `signal` cancels the idle
/// dispatcher. A fatal dispatch error ends the relay as soon as the worker
/// returns it.
async fn relay<R, F>(
    mut lines: Lines<R>,
    inbox: Inbox,
    transport: &ConsoleTransport,
    mut worker: JoinHandle<Result<(), DispatchError>>,
    shutdown: CancellationToken,
    signal: F,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(signal);
    let mut inbox = Some(inbox);
    let outcome = loop {
        tokio::select! {
            joined = &mut worker => break joined.context("dispatcher task panicked")?,
            line = lines.next_line(), if inbox.is_some() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let delivered = inbox
                        .as_ref()
                        .map(|inbox| inbox.deliver(transport.event_from_line(&line)));
                    if delivered == Some(Delivery::Closed) {
                        inbox = None;
                    }
                }
                None => inbox = None,
            },
            () = &mut signal, if !shutdown.is_cancelled() => {
                shutdown.cancel();
                inbox = None;
            }
        }
    };
    outcome.context("dispatcher stopped on a fatal error")
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
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
