use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Background sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between periodic sync passes
    pub interval_secs: u64,
    /// Per-collection timeout for full refetches
    pub fetch_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            fetch_timeout_secs: 10,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the local cache database
    pub database_path: ConfigValue<PathBuf>,
    /// Base URL of the shop API (without the `/api` suffix)
    pub server_url: ConfigValue<String>,
    /// Bearer token sent with every request
    #[serde(skip_serializing)]
    pub api_token: Option<ConfigValue<String>>,
    /// Treat the server as unreachable without trying it
    pub offline: ConfigValue<bool>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncSettings,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    server_url: Option<String>,
    api_token: Option<String>,
    offline: Option<bool>,
    sync: Option<SyncSettings>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("cache.db"),
            ConfigSource::Default,
        );
        let mut server_url = ConfigValue::new(DEFAULT_SERVER_URL.to_string(), ConfigSource::Default);
        let mut api_token = None;
        let mut offline = ConfigValue::new(false, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncSettings::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(url) = file_config.server_url {
                server_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(token) = file_config.api_token {
                api_token = Some(ConfigValue::new(token, ConfigSource::File));
            }
            if let Some(flag) = file_config.offline {
                offline = ConfigValue::new(flag, ConfigSource::File);
            }
            if let Some(settings) = file_config.sync {
                sync = settings;
            }
        }

        if let Ok(db_path) = std::env::var("TAILORSHOP_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TAILORSHOP_SERVER_URL") {
            server_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(token) = std::env::var("TAILORSHOP_API_TOKEN") {
            api_token = Some(ConfigValue::new(token, ConfigSource::Environment));
        }
        if let Ok(flag) = std::env::var("TAILORSHOP_OFFLINE") {
            let flag = parse_flag(&flag)
                .ok_or_else(|| ConfigError::InvalidValue("TAILORSHOP_OFFLINE", flag.clone()))?;
            offline = ConfigValue::new(flag, ConfigSource::Environment);
        }

        Ok(Self {
            database_path,
            server_url,
            api_token,
            offline,
            config_file,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/tailorshop/
    /// - macOS: ~/Library/Application Support/tailorshop/
    /// - Windows: %APPDATA%/tailorshop/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tailorshop")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/tailorshop/
    /// - macOS: ~/Library/Application Support/tailorshop/
    /// - Windows: %APPDATA%/tailorshop/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tailorshop")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
