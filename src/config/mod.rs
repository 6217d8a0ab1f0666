//! Client configuration
//!
//! Typed configuration loaded from `~/.config/entregas/config.json5` (JSON5,
//! so comments and trailing commas are fine). Every field has a default, so
//! a missing file yields a usable configuration pointing at the production
//! backends.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "ENTREGAS_CONFIG";

/// Default host serving the REST API and the push-event channel.
const DEFAULT_API_BASE_URL: &str = "http://botdasentregas.hopto.org:8221";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("could not resolve a home directory for client state")]
    NoHome,

    #[error("invalid URL in configuration: {0}")]
    InvalidUrl(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the primary REST backend.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: Url,

    /// Base URL of the pairing/session backend. Falls back to
    /// `api_base_url` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_base_url: Option<Url>,

    /// Push-event channel URL. Derived from the pairing base URL
    /// (http → ws, https → wss) when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<Url>,

    /// Static API key for the privileged withdrawal-review endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_key: Option<String>,

    /// Directory holding client state (the stored credential).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_api_base_url() -> Url {
    Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            pairing_base_url: None,
            socket_url: None,
            admin_api_key: None,
            state_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Base URL used for pairing-session calls.
    pub fn pairing_base_url(&self) -> &Url {
        self.pairing_base_url.as_ref().unwrap_or(&self.api_base_url)
    }

    /// Resolve the push-event channel URL.
    pub fn socket_url(&self) -> Result<Url, ConfigError> {
        if let Some(url) = &self.socket_url {
            return Ok(url.clone());
        }
        let mut url = self.pairing_base_url().clone();
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
        Ok(url)
    }

    /// Resolve the directory holding client state, creating nothing.
    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::config_dir()
            .map(|d| d.join("entregas"))
            .ok_or(ConfigError::NoHome)
    }
}

/// Resolve the config file path (`ENTREGAS_CONFIG` override or the default
/// location under the user config directory).
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|d| d.join("entregas").join("config.json5"))
        .ok_or(ConfigError::NoHome)
}

/// Load configuration from disk; a missing file yields the defaults.
pub fn load() -> Result<Config, ConfigError> {
    let path = config_path()?;
    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)?;
    json5::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_production_host() {
        let config = Config::default();
        assert_eq!(config.api_base_url.as_str(), format!("{}/", DEFAULT_API_BASE_URL));
        assert_eq!(config.pairing_base_url(), &config.api_base_url);
    }

    #[test]
    fn socket_url_derives_ws_scheme() {
        let config = Config::default();
        let socket = config.socket_url().unwrap();
        assert_eq!(socket.scheme(), "ws");

        let config = Config {
            api_base_url: Url::parse("https://api.example.com").unwrap(),
            ..Config::default()
        };
        assert_eq!(config.socket_url().unwrap().scheme(), "wss");
    }

    #[test]
    fn explicit_socket_url_wins() {
        let config = Config {
            socket_url: Some(Url::parse("wss://events.example.com/").unwrap()),
            ..Config::default()
        };
        assert_eq!(config.socket_url().unwrap().as_str(), "wss://events.example.com/");
    }

    #[test]
    fn parses_json5_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(
            &path,
            r#"{
                // staging backend
                apiBaseUrl: "https://staging.example.com",
                logging: { level: "debug" },
            }"#,
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.api_base_url.host_str(), Some("staging.example.com"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("nope.json5")).unwrap();
        assert_eq!(config.api_base_url, Config::default().api_base_url);
    }
}
