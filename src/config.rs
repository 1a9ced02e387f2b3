//! Console configuration.
//!
//! Sources, later ones override earlier ones:
//! 1. Built-in defaults
//! 2. `config.toml` (explicit `--config` path, else `<config dir>/display-console/config.toml`)
//! 3. Environment: `DISPLAY_CONSOLE_URL`, `DISPLAY_CONSOLE_ANON_KEY`
//!
//! The anon key may also live in the OS keychain (see [`crate::keychain`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::ConsoleError;
use crate::refresh::RefreshSettings;

pub const ENV_URL: &str = "DISPLAY_CONSOLE_URL";
pub const ENV_ANON_KEY: &str = "DISPLAY_CONSOLE_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub service: ServiceConfig,
    pub realtime: RealtimeConfig,
    pub refresh: RefreshConfig,
    pub storage: StorageConfig,
    /// Recorded as `uploaded_by` on new videos.
    pub operator: String,
    /// Where CSV exports are written; current directory when unset.
    pub export_dir: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            realtime: RealtimeConfig::default(),
            refresh: RefreshConfig::default(),
            storage: StorageConfig::default(),
            operator: "admin".to_string(),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    pub anon_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RealtimeConfig {
    pub topic: String,
    pub heartbeat_secs: u64,
    /// Limit for opening the socket and joining the topic.
    pub join_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            topic: "login_updates".to_string(),
            heartbeat_secs: 30,
            join_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub debounce_ms: u64,
    pub max_wait_ms: u64,
    pub visibility_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 600,
            max_wait_ms: 3000,
            visibility_delay_ms: 300,
        }
    }
}

impl RefreshConfig {
    pub fn settings(&self) -> RefreshSettings {
        RefreshSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            visibility_delay: Duration::from_millis(self.visibility_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "ads-videos".to_string(),
        }
    }
}

/// `<config dir>/display-console/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("display-console").join("config.toml"))
}

impl ConsoleConfig {
    /// Load defaults, then the config file, then environment overrides.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConsoleError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConsoleError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            ConsoleError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            debug!("Service URL overridden from {}", ENV_URL);
            self.service.url = url.trim().to_string();
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.trim().is_empty()) {
            debug!("Anon key overridden from {}", ENV_ANON_KEY);
            self.service.anon_key = Some(key.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        if !self.service.url.is_empty() {
            self.base_url()?;
        }
        if self.refresh.debounce_ms == 0 {
            return Err(ConsoleError::Config("refresh.debounce_ms must be greater than 0".into()));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConsoleError::Config("storage.bucket must not be empty".into()));
        }
        if self.operator.trim().is_empty() {
            return Err(ConsoleError::Config("operator must not be empty".into()));
        }
        Ok(())
    }

    /// Parsed service URL. Errors when unset so commands fail with a clear message.
    pub fn base_url(&self) -> Result<Url, ConsoleError> {
        if self.service.url.trim().is_empty() {
            return Err(ConsoleError::Config(format!(
                "Service URL is not configured. Set service.url in config.toml or {}.",
                ENV_URL
            )));
        }
        Url::parse(self.service.url.trim()).map_err(|e| {
            ConsoleError::Config(format!("Invalid service URL '{}': {}", self.service.url, e))
        })
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
