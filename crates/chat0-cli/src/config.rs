use chat0_persist::CacheConfig;
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub cache: CacheSettings,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub backend_url: String,
    #[serde(default)]
    pub backend_anon_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Postgrest,
    Mongodb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub poll_interval_ms: u64,
    /// Database name, MongoDB only
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "chat0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub min_interval_ms: u64,
    pub max_calls_per_window: usize,
    pub window_secs: u64,
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_secs),
            min_interval: Duration::from_millis(settings.min_interval_ms),
            max_calls_per_window: settings.max_calls_per_window,
            window: Duration::from_secs(settings.window_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Sent to OpenRouter as `HTTP-Referer`
    pub app_url: String,
    /// Sent to OpenRouter as `X-Title`
    pub app_title: String,
    /// Settings file; defaults to the user config dir
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables prefixed `CHAT0_`, sections split by `__`
    ///    (e.g. `CHAT0_BACKEND__KIND=postgrest`)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("CHAT0")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.apply_secrets(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }

    /// Fill backend secrets and fail when the chosen backend lacks one
    pub fn apply_secrets(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::Message(format!("{} environment variable is required", name)))
        };

        match self.backend.kind {
            BackendKind::Memory => {}
            BackendKind::Postgrest => {
                self.backend_url = required("BACKEND_URL")?;
                self.backend_anon_key = required("BACKEND_ANON_KEY")?;
            }
            BackendKind::Mongodb => {
                self.backend_url = required("BACKEND_URL")?;
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.backend.poll_interval_ms)
    }
}
