//! Application orchestrator: wires settings, observers and the supervisor.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wbskt_client::{ClientPayload, MessageDispatcher, RetrySupervisor, TokenProvider};

use crate::config::{Config, FileSettings};
use crate::handler;

/// Upper bound for finishing queued commands after the connection stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the agent until shutdown is requested.
pub async fn run(path: PathBuf, config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // -- Observers --
    let mut dispatcher = MessageDispatcher::default().with_observer(|payload: ClientPayload| {
        tracing::info!(data = %payload.data, "triggered");
    });

    let worker = match config.handler.command() {
        Some(spec) => {
            tracing::info!(program = %spec.program, "payload command enabled");
            let (queue, worker) = handler::spawn(spec, config.handler.queue_capacity);
            dispatcher = dispatcher.with_observer(queue.observer());
            Some(worker)
        }
        None => {
            tracing::info!("no payload command configured, payloads are only logged");
            None
        }
    };

    // -- Supervisor --
    let supervisor = RetrySupervisor::new(
        Arc::new(FileSettings::new(path)),
        TokenProvider::new()?,
        dispatcher,
    );

    spawn_signal_handlers(cancel.clone());

    tracing::info!("agent ready");
    supervisor.run(cancel).await;

    // Dropping the supervisor drops the dispatcher and closes the queue.
    drop(supervisor);

    if let Some(worker) = worker {
        tracing::info!("waiting for queued commands");
        match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "command worker failed"),
            Err(_) => tracing::warn!("queued commands still running, abandoning them"),
        }
    }

    Ok(())
}

/// Cancels `cancel` on Ctrl-C, and on SIGTERM where available.
fn spawn_signal_handlers(cancel: CancellationToken) {
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, shutting down");
            on_ctrl_c.cancel();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };
        tokio::spawn(async move {
            if sigterm.recv().await.is_some() {
                tracing::info!("SIGTERM received, shutting down");
                cancel.cancel();
            }
        });
    }
}
