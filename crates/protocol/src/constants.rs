use std::time::Duration;

/// Client registration endpoint on the core server. Exchanges the channel
/// credential for a connection token.
pub const CLIENT_REGISTRATION_PATH: &str = "/api/channels/client";

/// WebSocket endpoint on the socket server named by the token.
pub const WS_PATH: &str = "/ws";

/// First frame sent by the client after the socket opens.
pub const LIVENESS_PROBE: &str = "ping";

/// Delay between connection attempts when none is configured.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 10;

/// Maximum payload frame size in bytes (1 MB).
///
/// Payloads are single command strings; anything larger is dropped without
/// closing the connection.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Hard transport limit in bytes (16 MB). A message above this ends the
/// connection attempt.
pub const WS_TRANSPORT_MAX_MESSAGE_SIZE: usize = 16 * WS_MAX_MESSAGE_SIZE;

/// Upper bound on a best-effort close handshake.
///
/// A peer that never answers a close frame must not hold up shutdown.
pub const WS_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close reason sent when the client shuts down.
pub const CLOSE_REASON_CANCELLED: &str = "closing connection (client cancellation)";
