use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

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

/// Connection to the meal service
#[derive(Debug, Clone, Serialize)]
pub struct RemoteConfig {
    /// Server origin, e.g. "https://meals.example.com" (`api/v1` is appended)
    pub base_url: ConfigValue<Option<String>>,
    /// Bearer token; never printed
    #[serde(skip_serializing)]
    pub token: ConfigValue<Option<String>>,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl RemoteConfig {
    /// Returns true if both the server and the token are known
    pub fn is_configured(&self) -> bool {
        self.base_url.value.is_some() && self.token.value.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Run a sync pass after write commands when the server answers (default: false)
    pub auto_sync: bool,
    /// Period of the background sync loop
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: false,
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Root of the local store
    pub data_dir: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
}

/// Internal structs for deserializing the config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    remote: Option<RemoteFile>,
    sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RemoteFile {
    base_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut base_url = ConfigValue::new(None, ConfigSource::Default);
        let mut token = ConfigValue::new(None, ConfigSource::Default);
        let mut timeout_secs = DEFAULT_TIMEOUT_SECS;
        let mut probe_timeout_secs = DEFAULT_PROBE_TIMEOUT_SECS;
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(remote) = file_config.remote {
                if remote.base_url.is_some() {
                    base_url = ConfigValue::new(remote.base_url, ConfigSource::File);
                }
                if remote.token.is_some() {
                    token = ConfigValue::new(remote.token, ConfigSource::File);
                }
                timeout_secs = remote.timeout_secs.unwrap_or(timeout_secs);
                probe_timeout_secs = remote.probe_timeout_secs.unwrap_or(probe_timeout_secs);
            }
            if let Some(sync_config) = file_config.sync {
                if sync_config.interval_secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        path.clone(),
                        "sync.interval_secs must be at least 1".to_string(),
                    ));
                }
                sync = sync_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("MEALSYNC_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("MEALSYNC_BASE_URL") {
            base_url = ConfigValue::new(Some(url), ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("MEALSYNC_TOKEN") {
            token = ConfigValue::new(Some(key), ConfigSource::Environment);
        }

        Ok(Self {
            data_dir,
            config_file,
            remote: RemoteConfig {
                base_url,
                token,
                timeout_secs,
                probe_timeout_secs,
            },
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/mealsync/
    /// - macOS: ~/Library/Application Support/mealsync/
    /// - Windows: %APPDATA%/mealsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mealsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/mealsync/
    /// - macOS: ~/Library/Application Support/mealsync/
    /// - Windows: %APPDATA%/mealsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mealsync")
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
    InvalidValue(PathBuf, String),
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
            ConfigError::InvalidValue(path, message) => {
                write!(f, "Invalid config file '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
