//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - path given as the first CLI argument, or
//! - `WBSKT_CONFIG`, or
//! - Linux: `~/.config/wbskt/client.toml`
//! - Windows: `%APPDATA%/wbskt/client.toml`
//!
//! The file is re-read before every connection attempt, so credential and
//! server changes apply without a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wbskt_client::{
    ChannelCredential, ClientIdentity, ClientSettings, ConfigError, SettingsSource,
    TransportSecurity,
};

use crate::handler::CommandSpec;

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host[:port]` of the core server.
    #[serde(default)]
    pub core_server_address: String,

    /// `https`/`wss` when true, `http`/`ws` otherwise.
    #[serde(default = "default_true")]
    pub use_tls: bool,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub channel: ChannelSection,

    #[serde(default)]
    pub handler: HandlerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub unique_id: Uuid,

    #[serde(default = "default_retry_interval")]
    pub retry_interval_seconds: u64,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ChannelSection {
    #[serde(default)]
    pub subscriber_id: Uuid,

    #[serde(default)]
    pub secret: String,
}

impl std::fmt::Debug for ChannelSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSection")
            .field("subscriber_id", &self.subscriber_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Command run for every received payload. Empty `program` disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerSection {
    #[serde(default)]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Pending commands kept while one runs; further payloads are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl HandlerSection {
    pub fn command(&self) -> Option<CommandSpec> {
        if self.program.trim().is_empty() {
            return None;
        }
        Some(CommandSpec {
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
        })
    }
}

fn default_queue_capacity() -> usize {
    crate::handler::DEFAULT_QUEUE_CAPACITY
}

impl Default for HandlerSection {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "wbskt-client".into());
    format!("{host}:{}", Uuid::new_v4())
}

fn default_retry_interval() -> u64 {
    wbskt_client::settings::default_retry_interval().as_secs()
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            unique_id: Uuid::nil(),
            retry_interval_seconds: default_retry_interval(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core_server_address: String::new(),
            use_tls: default_true(),
            client: ClientSection::default(),
            channel: ChannelSection::default(),
            handler: HandlerSection::default(),
        }
    }
}

impl Config {
    /// A fresh config for first start: new client id, no credential yet.
    pub fn initial() -> Self {
        let mut config = Self::default();
        config.client.unique_id = Uuid::new_v4();
        config
    }

    /// Loads configuration from `path`, or writes an initial one if missing.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::initial();
            config.save(path)?;
            tracing::warn!(
                path = %path.display(),
                "no configuration found, wrote a new one; fill in the channel credential"
            );
            Ok(config)
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file holds the channel secret.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Settings for one connection attempt.
    pub fn to_settings(&self) -> ClientSettings {
        ClientSettings {
            core_server_address: self.core_server_address.trim().to_string(),
            identity: ClientIdentity {
                name: self.client.name.clone(),
                unique_id: self.client.unique_id,
            },
            credential: ChannelCredential {
                subscriber_id: self.channel.subscriber_id,
                secret: self.channel.secret.clone(),
            },
            // Zero would spin; one second is the floor.
            retry_interval: Duration::from_secs(self.client.retry_interval_seconds.max(1)),
            security: if self.use_tls {
                TransportSecurity::Tls
            } else {
                TransportSecurity::Plain
            },
        }
    }
}

/// Re-reads the configuration file on every load.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsSource for FileSettings {
    fn load(&self) -> Result<ClientSettings, ConfigError> {
        Config::load(&self.path)
            .map(|c| c.to_settings())
            .map_err(|e| ConfigError::Load(format!("{}: {e}", self.path.display())))
    }
}

/// Resolves the configuration file path.
pub fn config_path(cli_arg: Option<String>) -> PathBuf {
    if let Some(arg) = cli_arg.filter(|a| !a.is_empty()) {
        return PathBuf::from(arg);
    }
    if let Some(env) = std::env::var_os("WBSKT_CONFIG").filter(|v| !v.is_empty()) {
        return PathBuf::from(env);
    }
    default_config_path()
}

/// Returns the platform-specific configuration file path.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("wbskt").join("client.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("wbskt")
            .join("client.toml")
    }
}
