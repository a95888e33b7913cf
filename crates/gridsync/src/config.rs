//! Configuration for the server and the admin tool.
//!
//! Both read an optional TOML file and command-line flags. Flags win over
//! the file, and the file wins over built-in defaults.
//!
//! ```toml
//! [server]
//! hostname = "127.0.0.1"
//! port = 65432
//! idle_timeout_secs = 600
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use gridsync_protocol::MapId;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Command-line arguments
// ---------------------------------------------------------------------------

/// Command-line arguments for `gridsync-server`.
#[derive(Parser, Debug)]
#[command(name = "gridsync-server", version)]
#[command(about = "Serves the active map and token positions to map viewers")]
pub struct ServerArgs {
    /// Map file that is active at startup
    pub map: String,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds a connection may stay silent before it is dropped (0 = never)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Command-line arguments for `gridsync-admin`.
#[derive(Parser, Debug)]
#[command(name = "gridsync-admin", version)]
#[command(about = "Interactive console for switching the active map")]
pub struct AdminArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// TOML file
// ---------------------------------------------------------------------------

/// TOML configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[server]` table: where the server listens and clients connect.
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// `[logging]` table.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    65432
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FileConfig {
    /// Reads `path`, or returns the defaults if no path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            }
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Final settings for the server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub map: MapId,
    pub addr: String,
    pub idle_timeout: Option<Duration>,
    pub log_level: String,
}

impl ServerConfig {
    /// Loads the file named by `--config` (if any) and applies the flags.
    pub fn from_args(args: ServerArgs) -> Result<Self, ConfigError> {
        let file = FileConfig::load(args.config.as_deref())?;
        Self::resolve(args, file)
    }

    /// Merges flags over file values.
    pub fn resolve(args: ServerArgs, file: FileConfig) -> Result<Self, ConfigError> {
        if args.map.trim().is_empty() {
            return Err(ConfigError::Invalid("startup map name is empty".into()));
        }

        let host = args.host.unwrap_or(file.server.hostname);
        let port = args.port.unwrap_or(file.server.port);
        let idle_secs = args.idle_timeout.unwrap_or(file.server.idle_timeout_secs);

        Ok(Self {
            map: MapId::new(args.map),
            addr: format!("{host}:{port}"),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            log_level: args.log_level.unwrap_or(file.logging.level),
        })
    }
}

/// Final settings for the admin tool.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub addr: String,
    pub log_level: String,
}

impl AdminConfig {
    /// Loads the file named by `--config` (if any) and applies the flags.
    pub fn from_args(args: AdminArgs) -> Result<Self, ConfigError> {
        let file = FileConfig::load(args.config.as_deref())?;
        Ok(Self::resolve(args, file))
    }

    /// Merges flags over file values.
    pub fn resolve(args: AdminArgs, file: FileConfig) -> Self {
        let host = args.host.unwrap_or(file.server.hostname);
        let port = args.port.unwrap_or(file.server.port);
        Self {
            addr: format!("{host}:{port}"),
            log_level: args.log_level.unwrap_or(file.logging.level),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
