//! Configuration system for the `RoomChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/roomchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use crate::chat::history::{HistoryLimits, PRIVATE_HISTORY_LIMIT, ROOM_HISTORY_LIMIT};
use crate::console;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    chat: ChatFileConfig,
    network: NetworkFileConfig,
    session: SessionFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    api_url: Option<String>,
    ws_url: Option<String>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    room_history_limit: Option<usize>,
    private_history_limit: Option<usize>,
    timestamp_format: Option<String>,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    channel_capacity: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Base URL of the REST API.
    pub api_url: String,
    /// WebSocket endpoint.
    pub ws_url: String,
    /// Name to log in with; `None` resumes the saved session.
    pub username: Option<String>,

    // -- Chat --
    /// Per-conversation history capacities.
    pub history: HistoryLimits,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,

    // -- Network --
    /// Capacity of the transport event, command, and client event channels.
    pub channel_capacity: usize,

    // -- Session --
    /// Where the device id and saved session live. `None` uses the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8070/v1/api".to_string(),
            ws_url: "ws://localhost:8070/v1/api/ws".to_string(),
            username: None,
            history: HistoryLimits::default(),
            timestamp_format: "%H:%M".to_string(),
            channel_capacity: 256,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path (`~/.config/roomchat/config.toml`)
    /// is tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            api_url: cli
                .api_url
                .clone()
                .or_else(|| file.server.api_url.clone())
                .unwrap_or(defaults.api_url),
            ws_url: cli
                .ws_url
                .clone()
                .or_else(|| file.server.ws_url.clone())
                .unwrap_or(defaults.ws_url),
            username: cli.username.clone().filter(|name| !name.trim().is_empty()),
            history: HistoryLimits {
                room: file.chat.room_history_limit.unwrap_or(ROOM_HISTORY_LIMIT),
                private: file
                    .chat
                    .private_history_limit
                    .unwrap_or(PRIVATE_HISTORY_LIMIT),
            },
            timestamp_format: resolve_timestamp_format(
                file.chat.timestamp_format.as_deref(),
                defaults.timestamp_format,
            ),
            channel_capacity: file
                .network
                .channel_capacity
                .unwrap_or(defaults.channel_capacity)
                .max(1),
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.session.data_dir.clone()),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal client for room and private chat")]
pub struct CliArgs {
    /// Base URL of the chat server's REST API.
    #[arg(long, env = "ROOMCHAT_API_URL")]
    pub api_url: Option<String>,

    /// WebSocket endpoint of the chat server.
    #[arg(long, env = "ROOMCHAT_WS_URL")]
    pub ws_url: Option<String>,

    /// Log in as this user. Without it, the saved session is resumed.
    #[arg(short, long, env = "ROOMCHAT_USERNAME")]
    pub username: Option<String>,

    /// Path to config file (default: `~/.config/roomchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the device id and saved session.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "ROOMCHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/roomchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Use `configured` if chrono can render it, otherwise `default`.
fn resolve_timestamp_format(configured: Option<&str>, default: String) -> String {
    match configured {
        Some(format) if console::is_valid_timestamp_format(format) => format.to_string(),
        Some(format) => {
            tracing::warn!(format, fallback = %default, "invalid timestamp_format, using default");
            default
        }
        None => default,
    }
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and a missing
/// file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("roomchat").join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
