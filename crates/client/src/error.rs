//! Error types for the connection lifecycle.
//!
//! None of these are fatal to the process: the supervisor logs them and
//! retries after the configured delay. Cancellation is not an error and has
//! no variant here.

use tokio_tungstenite::tungstenite;

use wbskt_protocol::ClaimsError;

/// Settings are unusable for a connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0} is not set")]
    Missing(&'static str),

    #[error("configuration could not be loaded: {0}")]
    Load(String),
}

/// Token acquisition failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("cannot reach core server {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("core server rejected registration ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("core server returned an empty token")]
    EmptyToken,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unreadable token claims: {0}")]
    Claims(#[from] ClaimsError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// A connection attempt ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("cannot connect to {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    Protocol(#[from] tungstenite::Error),

    #[error("connection ended without a close handshake")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::Missing("channel secret");
        assert_eq!(
            err.to_string(),
            "invalid configuration: channel secret is not set"
        );

        let err = AuthError::Rejected {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "core server rejected registration (500): boom"
        );

        let err = AuthError::EmptyToken;
        assert_eq!(err.to_string(), "core server returned an empty token");

        let err = ConnError::Interrupted;
        assert_eq!(
            err.to_string(),
            "connection ended without a close handshake"
        );

        let err = ConnError::Protocol(tungstenite::Error::ConnectionClosed);
        assert!(err.to_string().starts_with("WebSocket error"));
    }
}
