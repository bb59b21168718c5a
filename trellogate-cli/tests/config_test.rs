//! Integration tests for CLI configuration loading.

use std::time::Duration;

use tempfile::TempDir;
use trellogate_cli::config::load_from_path;

#[test]
fn test_missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    let config = load_from_path(path.clone()).unwrap();

    assert_eq!(config.config_path, path);
    assert!(config.prefer_keyring);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.callback_url, "http://localhost/");
    assert_eq!(config.client.base_url, "https://api.trello.com");
    assert!(config.require_api_key().is_err());
}

#[test]
fn test_file_values_override_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
prefer_keyring = false
log_level = "debug"
callback_url = "http://127.0.0.1:3000/callback"

[client]
api_key = "abc"
storage_prefix = "work_"
popup_timeout_secs = 60
"#,
    )
    .unwrap();

    let config = load_from_path(path).unwrap();

    assert!(!config.prefer_keyring);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.callback_url, "http://127.0.0.1:3000/callback");
    assert_eq!(config.require_api_key().unwrap(), "abc");
    assert_eq!(config.client.storage_prefix, "work_");
    assert_eq!(config.client.popup_timeout(), Duration::from_secs(60));
    assert_eq!(config.client.api_version, 1);
}

#[test]
fn test_invalid_file_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "prefer_keyring = \"sometimes\"").unwrap();

    let error = load_from_path(path).unwrap_err();

    assert!(error.to_string().contains("Failed to parse config"));
}
