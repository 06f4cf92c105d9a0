//! Client settings and how they are sourced.

use std::time::Duration;

use wbskt_protocol::constants::DEFAULT_RETRY_INTERVAL_SECS;

use crate::error::ConfigError;
use crate::types::{ChannelCredential, ClientIdentity};

/// Whether to talk to the servers over TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSecurity {
    /// `https` for the token call, `wss` for the socket.
    #[default]
    Tls,
    /// `http` and `ws`. Local and development servers only.
    Plain,
}

impl TransportSecurity {
    pub fn http_scheme(self) -> &'static str {
        match self {
            Self::Tls => "https",
            Self::Plain => "http",
        }
    }

    pub fn ws_scheme(self) -> &'static str {
        match self {
            Self::Tls => "wss",
            Self::Plain => "ws",
        }
    }
}

/// Everything one connection attempt needs.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// `host[:port]` of the core server that issues tokens.
    pub core_server_address: String,
    pub identity: ClientIdentity,
    pub credential: ChannelCredential,
    /// Delay between attempts.
    pub retry_interval: Duration,
    pub security: TransportSecurity,
}

impl ClientSettings {
    /// Checks the fields an attempt cannot do without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_server_address.trim().is_empty() {
            return Err(ConfigError::Missing("core server address"));
        }
        if self.identity.unique_id.is_nil() {
            return Err(ConfigError::Missing("client unique id"));
        }
        if self.credential.subscriber_id.is_nil() {
            return Err(ConfigError::Missing("channel subscriber id"));
        }
        if self.credential.secret.trim().is_empty() {
            return Err(ConfigError::Missing("channel secret"));
        }
        Ok(())
    }
}

/// Default delay when no settings could be read yet.
pub fn default_retry_interval() -> Duration {
    Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS)
}

/// Supplies settings to the supervisor.
///
/// Called once per attempt, so implementations that re-read their backing
/// store pick up edits without a restart.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<ClientSettings, ConfigError>;
}

impl SettingsSource for ClientSettings {
    fn load(&self) -> Result<ClientSettings, ConfigError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
pub(crate) fn test_settings(core_server_address: &str) -> ClientSettings {
    ClientSettings {
        core_server_address: core_server_address.into(),
        identity: ClientIdentity {
            name: "test-client".into(),
            unique_id: uuid::Uuid::from_u128(0x11),
        },
        credential: ChannelCredential {
            subscriber_id: uuid::Uuid::from_u128(0x22),
            secret: "channel-secret".into(),
        },
        retry_interval: Duration::from_secs(10),
        security: TransportSecurity::Plain,
    }
}
