// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub statics: StaticConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Protocol style used to run the responder
    pub gateway: Gateway,
}

/// Which adapter carries requests into the responder
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    /// Asynchronous event exchange
    Events,
    /// Synchronous call-and-return, run on the blocking pool
    Blocking,
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Events => write!(f, "events"),
            Self::Blocking => write!(f, "blocking"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Who may cache served files
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Public,
    /// Browser caches only
    Private,
    /// Always revalidate; `max_age` is ignored
    NoCache,
}

/// Static file serving configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StaticConfig {
    /// Directory scanned for servable files
    pub root: String,
    /// URL prefix the directory is mounted at
    pub prefix: String,
    /// Maximum bytes per streamed chunk
    pub block_size: usize,
    /// `Cache-Control` directive attached to every file
    #[serde(default)]
    pub cache: CacheMode,
    /// `Cache-Control: max-age` in seconds; unset disables the header
    /// unless `cache` is `no_cache`
    #[serde(default)]
    pub max_age: Option<u32>,
    /// File name served for directory URLs ending in `/`
    #[serde(default)]
    pub index_file: Option<String>,
    /// Emit `Access-Control-Allow-Origin: *`
    #[serde(default)]
    pub allow_all_origins: bool,
    /// Suffix or file name to `Content-Type` overrides
    #[serde(default)]
    pub mimetypes: HashMap<String, String>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            root: "static".to_string(),
            prefix: "/".to_string(),
            block_size: 8192,
            cache: CacheMode::Public,
            max_age: Some(60),
            index_file: Some("index.html".to_string()),
            allow_all_origins: true,
            mimetypes: HashMap::new(),
        }
    }
}
