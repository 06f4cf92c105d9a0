//! Runs a local command for every received payload.
//!
//! The observer only enqueues; a single worker task drains the queue and
//! runs one command at a time, so the read loop never waits on a child
//! process. The queue is bounded: payloads arriving while it is full are
//! logged and dropped. The payload data is passed as the last argument,
//! never through a shell string.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use wbskt_client::ClientPayload;

/// Program and fixed arguments to run per payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Queue length used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Sending half of the command queue.
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<String>,
}

impl CommandQueue {
    /// Enqueues `data` without waiting. Returns `false` if it was dropped.
    pub fn push(&self, data: String) -> bool {
        match self.tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(data)) => {
                tracing::warn!(%data, "command queue full, payload dropped");
                false
            }
            Err(TrySendError::Closed(data)) => {
                tracing::warn!(%data, "command worker gone, payload dropped");
                false
            }
        }
    }

    /// Observer that enqueues each payload's data.
    pub fn observer(&self) -> impl Fn(ClientPayload) + Send + Sync + 'static {
        let queue = self.clone();
        move |payload: ClientPayload| {
            queue.push(payload.data);
        }
    }
}

/// Starts the worker with room for `capacity` pending commands. It exits
/// once every [`CommandQueue`] and observer built from it has been dropped
/// and the queue is drained.
pub fn spawn(spec: CommandSpec, capacity: usize) -> (CommandQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run_worker(spec, rx));
    (CommandQueue { tx }, handle)
}

async fn run_worker(spec: CommandSpec, mut rx: mpsc::Receiver<String>) {
    tracing::debug!(program = %spec.program, "command worker started");

    while let Some(data) = rx.recv().await {
        match execute(&spec, &data).await {
            Ok(status) if status.success() => {
                tracing::info!(%data, exit_code = status.code(), "command finished");
            }
            Ok(status) => {
                tracing::warn!(%data, exit_code = status.code(), "command failed");
            }
            Err(e) => {
                tracing::error!(program = %spec.program, %data, error = %e, "cannot run command");
            }
        }
    }

    tracing::debug!("command worker stopped");
}

async fn execute(spec: &CommandSpec, data: &str) -> std::io::Result<ExitStatus> {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .arg(data)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    tracing::debug!(program = %spec.program, %data, "spawning command");
    cmd.status().await
}
