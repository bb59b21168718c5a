//! CLI configuration handling.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trellogate_core::ClientConfig;

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "TRELLOGATE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Client settings: key, endpoints, storage prefix, popup timeout.
    #[serde(default)]
    pub client: ClientConfig,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Keep the token in the OS keyring instead of memory.
    #[serde(default = "default_prefer_keyring")]
    pub prefer_keyring: bool,

    /// Keyring service name the token is filed under.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Page the consent screen sends the browser back to.
    #[serde(default = "default_callback_url")]
    pub callback_url: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_prefer_keyring() -> bool {
    true
}

fn default_keyring_service() -> String {
    "trellogate".to_string()
}

fn default_callback_url() -> String {
    "http://localhost/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            config_path: PathBuf::new(),
            prefer_keyring: default_prefer_keyring(),
            keyring_service: default_keyring_service(),
            callback_url: default_callback_url(),
            log_level: default_log_level(),
        }
    }
}

impl CliConfig {
    /// Pick the API key: the flag wins over the environment, which wins
    /// over the file.
    pub fn apply_key_override(&mut self, flag: Option<String>, env: Option<String>) {
        if let Some(key) = flag.or(env).filter(|key| !key.trim().is_empty()) {
            self.client.api_key = key;
        }
    }

    /// Fail unless an API key is configured.
    pub fn require_api_key(&self) -> Result<&str> {
        let key = self.client.api_key.trim();
        if key.is_empty() {
            bail!(
                "no API key configured; pass --key, set {} or add api_key under [client] in {:?}",
                API_KEY_ENV,
                self.config_path
            );
        }
        Ok(key)
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields defaults.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path(),
    };
    load_from_path(config_path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(config_path: PathBuf) -> Result<CliConfig> {
    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("trellogate.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "trellogate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_beats_env_beats_file() {
        let mut config = CliConfig::default();
        config.client.api_key = "from-file".to_string();

        config.apply_key_override(None, Some("from-env".to_string()));
        assert_eq!(config.client.api_key, "from-env");

        config.apply_key_override(Some("from-flag".to_string()), Some("from-env".to_string()));
        assert_eq!(config.client.api_key, "from-flag");
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = CliConfig::default();
        config.client.api_key = "from-file".to_string();

        config.apply_key_override(Some("  ".to_string()), None);
        assert_eq!(config.client.api_key, "from-file");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let config = CliConfig::default();
        assert!(config.require_api_key().is_err());
    }
}
