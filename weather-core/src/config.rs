use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::provider::{endpoint::DEFAULT_ENDPOINT_URL, openweather::DEFAULT_BASE_URL};

/// Environment variable that overrides the configured provider key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

pub const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json";

/// Provider credentials, used by the server and by direct mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// How the dashboard acquires the user's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Look the position up from the public IP address.
    #[default]
    Ip,
    /// Use `lat`/`lon` from this section.
    Fixed,
    /// Location is never available; startup falls back to the default city.
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    #[serde(default)]
    pub source: LocationSource,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Override for the IP lookup service.
    pub lookup_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// endpoint_url = "http://127.0.0.1:3000"
///
/// [provider]
/// api_key = "..."
///
/// [location]
/// source = "fixed"
/// lat = -6.2
/// lon = 106.8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the forwarding endpoint used by the dashboard.
    pub endpoint_url: Option<String>,

    /// Listen address of `weather-server`.
    pub bind_addr: Option<String>,

    pub provider: Option<ProviderConfig>,

    #[serde(default)]
    pub location: LocationConfig,
}

impl Config {
    pub fn endpoint_url(&self) -> String {
        self.endpoint_url.clone().unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string())
    }

    pub fn bind_addr(&self) -> String {
        self.bind_addr.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
    }

    /// Provider key: `OPENWEATHER_API_KEY` first, then the config file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_or(std::env::var(API_KEY_ENV).ok())
    }

    /// `env_key` when set and non-blank, otherwise the file key.
    pub fn api_key_or(&self, env_key: Option<String>) -> Option<String> {
        env_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.file_api_key().map(str::to_owned))
    }

    /// Key stored in the config file, ignoring the environment.
    pub fn file_api_key(&self) -> Option<&str> {
        self.provider
            .as_ref()
            .map(|p| p.api_key.as_str())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn provider_base_url(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Set/replace the provider key, keeping any base URL override.
    pub fn set_api_key(&mut self, api_key: String) {
        match self.provider.as_mut() {
            Some(provider) => provider.api_key = api_key,
            None => self.provider = Some(ProviderConfig { api_key, base_url: None }),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path of the persisted last-search record.
    pub fn last_search_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("weather-app-last-search.json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}
