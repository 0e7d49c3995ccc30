use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the database path.
pub const ENV_DATABASE_PATH: &str = "DOCROUTE_DATABASE_PATH";
/// Environment variable that overrides the bind host.
pub const ENV_HOST: &str = "DOCROUTE_HOST";
/// Environment variable that overrides the bind port.
pub const ENV_PORT: &str = "DOCROUTE_PORT";
/// Environment variable holding the shared API secret. Takes precedence over
/// the config file's `api_secret`.
pub const ENV_API_SECRET: &str = "DOCROUTE_API_SECRET";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::CommandLine => write!(f, "command line"),
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

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Host to bind the HTTP server to
    pub host: ConfigValue<String>,
    /// Port to bind the HTTP server to
    pub port: ConfigValue<u16>,
    /// Shared secret required in the `x-api-secret` header, if any
    #[serde(skip_serializing)]
    pub api_secret: ConfigValue<Option<String>>,
    /// Maximum number of cached collection handles
    pub router_capacity: ConfigValue<usize>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    api_secret: Option<String>,
    router_capacity: Option<usize>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("docroute.db"),
            ConfigSource::Default,
        );
        let mut host = ConfigValue::new("0.0.0.0".to_string(), ConfigSource::Default);
        let mut port = ConfigValue::new(8000u16, ConfigSource::Default);
        let mut api_secret = ConfigValue::new(None, ConfigSource::Default);
        let mut router_capacity = ConfigValue::new(
            docroute_core::router::DEFAULT_CAPACITY,
            ConfigSource::Default,
        );
        let mut config_file = None;

        // Try to load from config file
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
            if let Some(value) = file_config.host {
                host = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(value) = file_config.port {
                port = ConfigValue::new(value, ConfigSource::File);
            }
            if let Some(secret) = file_config.api_secret.filter(|s| !s.is_empty()) {
                api_secret = ConfigValue::new(Some(secret), ConfigSource::File);
            }
            if let Some(value) = file_config.router_capacity {
                router_capacity = ConfigValue::new(value, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var(ENV_DATABASE_PATH) {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(value) = std::env::var(ENV_HOST) {
            host = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Ok(value) = std::env::var(ENV_PORT) {
            let parsed = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(ENV_PORT, value))?;
            port = ConfigValue::new(parsed, ConfigSource::Environment);
        }
        if let Ok(secret) = std::env::var(ENV_API_SECRET) {
            if !secret.is_empty() {
                api_secret = ConfigValue::new(Some(secret), ConfigSource::Environment);
            }
        }

        Ok(Self {
            database_path,
            host,
            port,
            api_secret,
            router_capacity,
            config_file,
        })
    }

    /// Reads only `api_secret` from a config file. An empty value counts as unset.
    pub fn read_api_secret(path: &Path) -> Result<Option<String>, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        let file_config: ConfigFile = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
        Ok(file_config.api_secret.filter(|s| !s.is_empty()))
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host.value, self.port.value)
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/docroute/
    /// - macOS: ~/Library/Application Support/docroute/
    /// - Windows: %APPDATA%/docroute/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docroute")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/docroute/
    /// - macOS: ~/Library/Application Support/docroute/
    /// - Windows: %APPDATA%/docroute/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docroute")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
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
            ConfigError::InvalidValue(var, value) => {
                write!(f, "Invalid value for {}: '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
