// Configuration module entry point
// Loads config.toml plus SERVER_* environment overrides

mod types;

use std::net::SocketAddr;
use std::num::NonZeroUsize;

pub use types::{CacheMode, Config, Gateway, LoggingConfig, ServerConfig, StaticConfig};

/// Environment variable naming the config file (without extension)
const CONFIG_PATH_ENV: &str = "STATIC_RESPONDER_CONFIG";

impl Config {
    /// Load configuration from `$STATIC_RESPONDER_CONFIG`, or `config` when unset
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; every key has a default. Environment variables
    /// such as `SERVER_STATICS__ROOT` override file values.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let defaults = StaticConfig::default();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.gateway", "events")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("statics.root", defaults.root)?
            .set_default("statics.prefix", defaults.prefix)?
            .set_default("statics.block_size", 8192)?
            .set_default("statics.cache", "public")?
            .set_default("statics.max_age", 60)?
            .set_default("statics.index_file", "index.html")?
            .set_default("statics.allow_all_origins", defaults.allow_all_origins)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Streaming block size, rejected when zero
    pub fn block_size(&self) -> Result<NonZeroUsize, String> {
        NonZeroUsize::new(self.statics.block_size)
            .ok_or_else(|| "statics.block_size must be positive".to_string())
    }
}
