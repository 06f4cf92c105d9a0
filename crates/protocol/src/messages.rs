use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /api/channels/client`.
///
/// Exchanges the client identity and channel credential for a connection
/// token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConnectionRequest {
    pub channel_secret: String,
    pub client_name: String,
    pub client_unique_id: Uuid,
    pub channel_subscriber_id: Uuid,
}

impl fmt::Debug for ClientConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnectionRequest")
            .field("channel_secret", &"<redacted>")
            .field("client_name", &self.client_name)
            .field("client_unique_id", &self.client_unique_id)
            .field("channel_subscriber_id", &self.channel_subscriber_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Server push
// ---------------------------------------------------------------------------

/// Command delivered by the socket server, one per text frame.
///
/// Unknown fields are ignored so the server can extend the payload without
/// breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPayload {
    pub data: String,
}

impl ClientPayload {
    /// Parses a single text frame.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}
