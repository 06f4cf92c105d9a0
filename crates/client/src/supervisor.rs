//! Outer retry loop.
//!
//! Reloads and validates settings, fetches a fresh token, runs one
//! connection, then waits the retry interval. Repeats until cancelled.
//! Every failure is logged and retried; only cancellation stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionManager;
use crate::dispatch::MessageDispatcher;
use crate::error::ConfigError;
use crate::settings::{ClientSettings, SettingsSource, default_retry_interval};
use crate::state::{ConnectionState, StateTracker};
use crate::token::TokenProvider;

/// Top-level control loop for one client instance.
pub struct RetrySupervisor {
    source: Arc<dyn SettingsSource>,
    tokens: TokenProvider,
    dispatcher: MessageDispatcher,
    state: StateTracker,
}

impl RetrySupervisor {
    /// `dispatcher` carries every observer; it is read-only from here on.
    pub fn new(
        source: Arc<dyn SettingsSource>,
        tokens: TokenProvider,
        dispatcher: MessageDispatcher,
    ) -> Self {
        Self {
            source,
            tokens,
            dispatcher,
            state: StateTracker::new(),
        }
    }

    /// Watches state transitions of this supervisor.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Runs attempts until `cancel` fires.
    ///
    /// Any connection in flight has been closed and released by the time
    /// this returns.
    pub async fn run(&self, cancel: CancellationToken) {
        // Used until a settings load succeeds.
        let mut retry_interval = default_retry_interval();
        let mut attempt: u64 = 0;

        while !cancel.is_cancelled() {
            if let Some(settings) = self.load_settings(&mut retry_interval).await {
                attempt += 1;
                info!(
                    attempt,
                    client = %settings.identity.name,
                    core_server = %settings.core_server_address,
                    "client running"
                );
                self.attempt(&settings, &cancel).await;
            }

            if cancel.is_cancelled() {
                break;
            }

            self.state.set(ConnectionState::Backoff);
            debug!(
                delay_secs = format_args!("{:.1}", retry_interval.as_secs_f64()),
                "waiting before next attempt"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(retry_interval) => {}
            }
        }

        self.state.set(ConnectionState::ShuttingDown);
        info!(attempts = attempt, "client stopped");
    }

    /// Reads the current settings. `None` means no attempt this round.
    ///
    /// Sources may do file I/O, so the load runs on the blocking pool.
    async fn load_settings(&self, retry_interval: &mut Duration) -> Option<ClientSettings> {
        let source = Arc::clone(&self.source);
        let loaded = tokio::task::spawn_blocking(move || source.load())
            .await
            .unwrap_or_else(|e| Err(ConfigError::Load(format!("settings load aborted: {e}"))));
        let settings = match loaded {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "configuration unavailable");
                return None;
            }
        };
        *retry_interval = settings.retry_interval;

        if let Err(e) = settings.validate() {
            warn!(error = %e, "configuration invalid, not connecting");
            return None;
        }
        Some(settings)
    }

    /// One token + connection cycle. Errors end the attempt, never the loop.
    async fn attempt(&self, settings: &ClientSettings, cancel: &CancellationToken) {
        self.state.set(ConnectionState::Authenticating);

        let token = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("token request cancelled");
                return;
            }
            res = self.tokens.acquire(settings) => match res {
                Ok(token) => token,
                Err(e) => {
                    error!(
                        core_server = %settings.core_server_address,
                        error = %e,
                        "cannot obtain connection token"
                    );
                    return;
                }
            },
        };

        let manager = ConnectionManager::new(settings.security);
        let token_id = token.token_id().to_string();
        match manager
            .run(token, &self.dispatcher, &self.state, cancel)
            .await
        {
            Ok(end) => debug!(%token_id, ?end, "attempt finished"),
            Err(e) => error!(
                %token_id,
                error = %e,
                "unexpected error occurred during socket communication"
            ),
        }
    }
}
