//! Identity, credential and token values.

use std::fmt;

use uuid::Uuid;

use wbskt_protocol::TokenClaims;

/// Who this client is. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: String,
    pub unique_id: Uuid,
}

/// Channel subscription credential.
///
/// The secret never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelCredential {
    pub subscriber_id: Uuid,
    pub secret: String,
}

impl fmt::Debug for ChannelCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCredential")
            .field("subscriber_id", &self.subscriber_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token for exactly one connection attempt.
///
/// Not `Clone`: it is moved into the connection and dropped with it, so a
/// token can never be reused across attempts.
pub struct ConnectionToken {
    bearer: String,
    claims: TokenClaims,
}

impl ConnectionToken {
    pub(crate) fn new(bearer: String, claims: TokenClaims) -> Self {
        Self { bearer, claims }
    }

    /// The raw bearer string, sent as `Authorization: Bearer <token>`.
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    /// `host[:port]` of the socket server.
    pub fn socket_server_address(&self) -> &str {
        &self.claims.socket_server_address
    }

    /// Correlation id for logs.
    pub fn token_id(&self) -> &str {
        &self.claims.token_id
    }
}

impl fmt::Debug for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionToken")
            .field("token_id", &self.claims.token_id)
            .field("socket_server_address", &self.claims.socket_server_address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_secret() {
        let cred = ChannelCredential {
            subscriber_id: Uuid::from_u128(7),
            secret: "hunter2".into(),
        };
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn token_accessors() {
        let token = ConnectionToken::new(
            "abc.def.ghi".into(),
            TokenClaims {
                socket_server_address: "sock.example.com:443".into(),
                token_id: "t1".into(),
            },
        );
        assert_eq!(token.bearer(), "abc.def.ghi");
        assert_eq!(token.socket_server_address(), "sock.example.com:443");
        assert_eq!(token.token_id(), "t1");
        assert!(!format!("{token:?}").contains("abc.def.ghi"));
    }
}
