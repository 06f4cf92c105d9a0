//! Connection state published by the supervisor.

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

/// Where the client is in its connect/backoff cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started.
    Idle,
    /// Requesting a connection token.
    Authenticating,
    /// Opening the WebSocket.
    Connecting,
    /// Socket open, reading frames.
    Connected,
    /// Tearing the socket down.
    Closing,
    /// Waiting out the retry interval.
    Backoff,
    /// Cancelled; no further attempts.
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Backoff => "backoff",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

/// Single writer for the [`ConnectionState`] of one supervisor run.
///
/// Transitions are logged and published on a watch channel so embedders can
/// observe them without polling.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Idle);
        Self { tx }
    }

    /// Records a transition. Repeating the current state is a no-op.
    pub fn set(&self, next: ConnectionState) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "connection state changed");
            *current = next;
            true
        });
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}
