//! Claims embedded in the connection token.
//!
//! The core server issues a JWT-shaped bearer token (`header.claims.signature`).
//! The client only reads the claims segment to learn where to connect; the
//! signature is checked by the socket server, not here.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Errors from [`decode_claims`].
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("token is not in header.claims.signature form")]
    Shape,

    #[error("claims segment is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claim `{0}` is empty")]
    EmptyClaim(&'static str),
}

/// Routing and diagnostic claims carried by a connection token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// `host[:port]` of the socket server to dial.
    #[serde(
        rename = "socketServerAddress",
        alias = "SocketServerAddress",
        alias = "socket_server_address"
    )]
    pub socket_server_address: String,

    /// Correlation id used in logs on both sides.
    #[serde(
        rename = "tokenId",
        alias = "TokenId",
        alias = "token_id",
        alias = "jti"
    )]
    pub token_id: String,
}

/// Extracts [`TokenClaims`] from a bearer token without verifying it.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let claims = match (segments.next(), segments.next()) {
        (Some(header), Some(claims)) if !header.is_empty() && !claims.is_empty() => claims,
        _ => return Err(ClaimsError::Shape),
    };

    let bytes = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('='))?;
    let claims: TokenClaims = serde_json::from_slice(&bytes)?;

    if claims.socket_server_address.trim().is_empty() {
        return Err(ClaimsError::EmptyClaim("socketServerAddress"));
    }
    Ok(claims)
}
