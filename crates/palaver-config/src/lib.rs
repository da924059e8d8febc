//! Multi-tier TOML configuration for Palaver.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use palaver_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default identity service base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:1337";

/// The default timeout for identity service requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Resolved configuration for a Palaver process.
#[derive(Debug, Clone)]
pub struct PalaverConfig {
    pub api_url: String,
    pub channel_url: String,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub api_url: Option<String>,
    pub channel_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub channel_url: Option<String>,
}

impl PalaverConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`PALAVER_API_URL`, `PALAVER_CHANNEL_URL`)
    /// 3. Config file (~/.palaver/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let data_dir = config_dir();
        let settings = load_settings_file(&data_dir.join("config.toml"));
        Self::resolve(overrides, |key| std::env::var(key).ok(), settings, data_dir)
    }

    fn resolve(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        settings: SettingsFile,
        data_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let api_url = overrides
            .api_url
            .or_else(|| env("PALAVER_API_URL"))
            .or(settings.server.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = validate_url("api_url", &api_url, &["http://", "https://"])?;

        // The relay usually lives on the same host as the identity service
        let channel_url = match overrides
            .channel_url
            .or_else(|| env("PALAVER_CHANNEL_URL"))
            .or(settings.server.channel_url)
        {
            Some(url) => validate_url("channel_url", &url, &["ws://", "wss://"])?,
            None => websocket_url(&api_url),
        };

        let request_timeout_secs = settings
            .server
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(PalaverConfig {
            api_url,
            channel_url,
            request_timeout_secs,
            data_dir,
        })
    }
}

/// Get the Palaver data directory path (~/.palaver/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PALAVER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".palaver")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

/// Strip trailing slashes and check the scheme against `schemes`.
fn validate_url(key: &str, url: &str, schemes: &[&str]) -> Result<String, ConfigError> {
    let url = url.trim().trim_end_matches('/');
    let has_host = schemes
        .iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|host| !host.is_empty()));
    if has_host {
        Ok(url.to_string())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{url}' must start with one of {}", schemes.join(", ")),
        })
    }
}

/// Map an HTTP(S) URL to the matching WebSocket scheme.
fn websocket_url(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    }
}
