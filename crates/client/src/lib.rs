//! Connection lifecycle engine for the Wbskt client.
//!
//! Acquires a connection token from the core server, holds one WebSocket
//! connection to the socket server named by the token, dispatches received
//! payloads to registered observers, and reconnects with a fixed delay until
//! cancelled.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod token;
pub mod types;

pub use connection::{ConnectionManager, SessionEnd};
pub use dispatch::{DispatchOutcome, MessageDispatcher, Observer};
pub use error::{AuthError, ConfigError, ConnError};
pub use settings::{ClientSettings, SettingsSource, TransportSecurity};
pub use state::{ConnectionState, StateTracker};
pub use supervisor::RetrySupervisor;
pub use token::TokenProvider;
pub use types::{ChannelCredential, ClientIdentity, ConnectionToken};
pub use wbskt_protocol::ClientPayload;
