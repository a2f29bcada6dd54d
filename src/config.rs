//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::history::Capacities;
use crate::history::snapshot::SNAPSHOT_FILE;
use crate::station::{ReceiverSettings, DEFAULT_PORT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub history: Capacities,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// UDP receiver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_receive_timeout() -> u64 {
    60
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            receive_timeout_secs: default_receive_timeout(),
        }
    }
}

/// Log and cache file locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Snapshot directory; the log directory when unset
    pub cache_dir: Option<String>,

    #[serde(default = "default_log_flush")]
    pub log_flush_secs: u64,
}

fn default_log_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("tempest-logger").to_string_lossy().to_string())
        .unwrap_or_else(|| "./tempest_data".to_string())
}

fn default_log_flush() -> u64 {
    300 // 5 minutes
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            cache_dir: None,
            log_flush_secs: default_log_flush(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tempest-logger").join("config.toml")),
            Some(PathBuf::from("/etc/tempest-logger/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Load `explicit` if given, else search the default locations
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(log_dir) = var("TEMPEST_LOG_DIR") {
            self.storage.log_dir = log_dir;
        }
        if let Some(cache_dir) = var("TEMPEST_CACHE_DIR") {
            self.storage.cache_dir = Some(cache_dir);
        }

        // Station overrides
        if let Some(port) = var("TEMPEST_PORT") {
            match port.parse() {
                Ok(p) => self.station.port = p,
                Err(_) => tracing::warn!("Ignoring invalid TEMPEST_PORT {:?}", port),
            }
        }

        // Logging overrides
        if let Some(level) = var("TEMPEST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TEMPEST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the receiver cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.day_count == 0 {
            return Err(ConfigError::Invalid(
                "history.day_count must be at least 1".to_string(),
            ));
        }
        if self.storage.log_flush_secs == 0 {
            return Err(ConfigError::Invalid(
                "storage.log_flush_secs must be at least 1".to_string(),
            ));
        }
        if self.station.receive_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "station.receive_timeout_secs must be at least 1".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                other
            ))),
        }
    }

    /// Log directory, with a leading `~` expanded
    pub fn log_dir(&self) -> PathBuf {
        expand_home(&self.storage.log_dir)
    }

    /// Snapshot directory, falling back to the log directory
    pub fn cache_dir(&self) -> PathBuf {
        self.storage
            .cache_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| self.log_dir())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir().join(SNAPSHOT_FILE)
    }

    pub fn receiver_settings(&self) -> ReceiverSettings {
        ReceiverSettings {
            bind_address: self.station.bind_address.clone(),
            port: self.station.port,
            receive_timeout: Duration::from_secs(self.station.receive_timeout_secs),
            flush_interval: Duration::from_secs(self.storage.log_flush_secs),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tempest Logger Configuration
#
# Environment variables override these settings:
# - TEMPEST_LOG_DIR
# - TEMPEST_CACHE_DIR
# - TEMPEST_PORT
# - TEMPEST_LOG_LEVEL
# - TEMPEST_LOG_FORMAT

[station]
# Address to listen for hub broadcasts on
bind_address = "0.0.0.0"

# Tempest hubs broadcast on UDP 50222
port = 50222

# Longest wait for a datagram (seconds)
receive_timeout_secs = 60

[storage]
# Directory for the monthly weatherflow-YYYY-MM.txt logs
log_dir = "~/.local/share/tempest-logger"

# Directory for weatherflow-cache.txt (defaults to log_dir)
# cache_dir = "/var/cache/tempest-logger"

# How often to append received messages to the log (seconds)
log_flush_secs = 300

[history]
# Bins kept per resolution: 5 minute, 30 minute, 2 hour and daily
day_count = 600
week_count = 600
month_count = 600
year_count = 732

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.station.port, 50222);
        assert_eq!(config.station.receive_timeout_secs, 60);
        assert_eq!(config.storage.log_flush_secs, 300);
        assert_eq!(config.history, Capacities::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(Path::new("generated"), &generate_default_config()).unwrap();
        assert_eq!(config.station.bind_address, "0.0.0.0");
        assert_eq!(config.station.port, 50222);
        assert_eq!(config.history.year_count, 732);
        assert!(config.storage.cache_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [storage]
            log_dir = "/srv/weather"

            [history]
            day_count = 100
        "#;
        let config = Config::parse(Path::new("partial"), toml).unwrap();

        assert_eq!(config.log_dir(), PathBuf::from("/srv/weather"));
        assert_eq!(config.cache_dir(), PathBuf::from("/srv/weather"));
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/srv/weather/weatherflow-cache.txt")
        );
        assert_eq!(config.history.day_count, 100);
        assert_eq!(config.history.week_count, 600);
        assert_eq!(config.station.port, 50222);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[station]\nport = 50223\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.station.port, 50223);

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        std::fs::write(&path, "[station\nport = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TEMPEST_LOG_DIR", "/data/logs"),
            ("TEMPEST_CACHE_DIR", "/data/cache"),
            ("TEMPEST_PORT", "50300"),
            ("TEMPEST_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_dir(), PathBuf::from("/data/logs"));
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/data/cache/weatherflow-cache.txt")
        );
        assert_eq!(config.station.port, 50300);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "TEMPEST_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.station.port, 50222);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.history.day_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.storage.log_flush_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_receiver_settings() {
        let mut config = Config::default();
        config.station.bind_address = "192.168.1.10".to_string();
        config.storage.log_flush_secs = 120;

        let settings = config.receiver_settings();
        assert_eq!(settings.addr(), "192.168.1.10:50222");
        assert_eq!(settings.flush_interval, Duration::from_secs(120));
        assert_eq!(settings.receive_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/log"), PathBuf::from("/var/log"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/weather"), home.join("weather"));
        }
    }
}
