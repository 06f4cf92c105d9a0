//! One WebSocket connection, from dial to release.
//!
//! Sends the liveness probe, reads frames until the peer closes, the
//! transport fails, or cancellation fires, and releases the socket on every
//! exit path.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use wbskt_protocol::constants::{
    CLOSE_REASON_CANCELLED, LIVENESS_PROBE, WS_CLOSE_TIMEOUT, WS_PATH,
    WS_TRANSPORT_MAX_MESSAGE_SIZE,
};

use crate::dispatch::MessageDispatcher;
use crate::error::ConnError;
use crate::settings::TransportSecurity;
use crate::state::{ConnectionState, StateTracker};
use crate::types::ConnectionToken;

/// How a connection ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The socket server sent a close frame.
    PeerClosed { code: Option<u16>, reason: String },
    /// Cancellation fired before or during the session.
    Cancelled,
}

/// Runs single connection attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionManager {
    security: TransportSecurity,
}

impl ConnectionManager {
    pub fn new(security: TransportSecurity) -> Self {
        Self { security }
    }

    /// `ws(s)://{socketServerAddress}/ws` for the given token.
    pub fn socket_url(&self, token: &ConnectionToken) -> String {
        format!(
            "{}://{}{}",
            self.security.ws_scheme(),
            token.socket_server_address(),
            WS_PATH
        )
    }

    /// Connects with `token` and reads until the connection ends.
    ///
    /// The token is consumed: it lives exactly as long as this attempt.
    pub async fn run(
        &self,
        token: ConnectionToken,
        dispatcher: &MessageDispatcher,
        state: &StateTracker,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, ConnError> {
        let url = self.socket_url(&token);
        state.set(ConnectionState::Connecting);
        info!(%url, token_id = %token.token_id(), "trying to connect");

        let request =
            build_request(&url, token.bearer()).map_err(|source| ConnError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let connect =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config()), false);
        let ws = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(%url, "connect cancelled");
                return Ok(SessionEnd::Cancelled);
            }
            res = connect => match res {
                Ok((ws, _)) => ws,
                Err(source) => return Err(ConnError::Unreachable { url, source }),
            },
        };

        info!(%url, token_id = %token.token_id(), "connection established");
        state.set(ConnectionState::Connected);

        let result = run_session(ws, dispatcher, state, cancel).await;
        match &result {
            Ok(end) => info!(%url, token_id = %token.token_id(), ?end, "connection ended"),
            Err(e) => warn!(%url, token_id = %token.token_id(), error = %e, "connection failed"),
        }
        result
    }
}

fn ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(WS_TRANSPORT_MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(WS_TRANSPORT_MAX_MESSAGE_SIZE);
    config
}

/// Builds the upgrade request with the bearer token attached.
fn build_request(
    url: &str,
    bearer: &str,
) -> Result<tungstenite::handshake::client::Request, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    let value = HeaderValue::from_str(&format!("Bearer {bearer}"))
        .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

fn close_frame(reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: reason.into(),
    }
}

/// Drives an open socket to completion and releases it.
pub(crate) async fn run_session<S>(
    socket: S,
    dispatcher: &MessageDispatcher,
    state: &StateTracker,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ConnError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    let mut socket = Socket::new(socket);
    let result = read_loop(&mut socket, dispatcher, cancel).await;
    state.set(ConnectionState::Closing);
    socket.release().await;
    result
}

async fn read_loop<S>(
    socket: &mut Socket<S>,
    dispatcher: &MessageDispatcher,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ConnError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    // Fire and forget: a dead socket shows up on the next read.
    if let Err(e) = socket.send(Message::text(LIVENESS_PROBE)).await {
        warn!(error = %e, "liveness probe not sent");
    }

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            frame = socket.next() => Some(frame),
        };

        let Some(frame) = frame else {
            info!("cancellation requested, closing connection");
            let close = socket.send(Message::Close(Some(close_frame(
                CLOSE_REASON_CANCELLED,
            ))));
            match tokio::time::timeout(WS_CLOSE_TIMEOUT, close).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "close on cancellation failed"),
                Err(_) => warn!("close on cancellation timed out"),
            }
            return Ok(SessionEnd::Cancelled);
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                dispatcher.dispatch(text.as_str());
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_string()),
                    None => (None, String::new()),
                };
                // tungstenite has already echoed the peer's close frame; a
                // second close from here would be dropped.
                info!(?code, %reason, "closing connection (socket server initiated)");
                return Ok(SessionEnd::PeerClosed { code, reason });
            }
            Some(Ok(Message::Binary(data))) => {
                warn!(len = data.len(), "ignoring binary frame");
            }
            Some(Ok(other)) => {
                trace!(?other, "control frame");
            }
            Some(Err(e)) => return Err(ConnError::Protocol(e)),
            None => return Err(ConnError::Interrupted),
        }
    }
}

/// Exclusive owner of an open socket.
///
/// [`Socket::release`] closes and drops the underlying stream; further calls
/// are no-ops, and I/O after release reports `AlreadyClosed`.
pub(crate) struct Socket<S> {
    inner: Option<S>,
}

impl<S> Socket<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    pub(crate) fn new(inner: S) -> Self {
        Self { inner: Some(inner) }
    }

    async fn send(&mut self, msg: Message) -> Result<(), tungstenite::Error> {
        match self.inner.as_mut() {
            Some(s) => s.send(msg).await,
            None => Err(tungstenite::Error::AlreadyClosed),
        }
    }

    async fn next(&mut self) -> Option<Result<Message, tungstenite::Error>> {
        match self.inner.as_mut() {
            Some(s) => s.next().await,
            None => None,
        }
    }

    #[cfg(test)]
    fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Closes and drops the socket. Returns `false` if it was already
    /// released.
    pub(crate) async fn release(&mut self) -> bool {
        let Some(mut inner) = self.inner.take() else {
            return false;
        };
        match tokio::time::timeout(WS_CLOSE_TIMEOUT, inner.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "socket close reported an error"),
            Err(_) => warn!("socket close timed out"),
        }
        drop(inner);
        info!("disposed connection");
        true
    }
}
