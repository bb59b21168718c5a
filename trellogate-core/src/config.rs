//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec;

/// Default REST API host.
pub const DEFAULT_BASE_URL: &str = "https://api.trello.com";

/// Default authorization endpoint; popup callbacks must come from this origin.
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://trello.com";

/// Default prefix for persisted entries.
pub const DEFAULT_STORAGE_PREFIX: &str = "trello_";

/// Default bound on how long a popup attempt waits for its callback.
pub const DEFAULT_POPUP_TIMEOUT_SECS: u64 = 300;

/// Static configuration of a client.
///
/// Everything but `api_key` is fixed once the client is built; the key can be
/// rotated through the client's `set_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application key sent with every request and authorization.
    pub api_key: String,

    /// API version segment used in REST and authorization URLs.
    pub api_version: u32,

    /// REST API host, without the version segment.
    pub base_url: String,

    /// Authorization host.
    pub auth_endpoint: String,

    /// Namespace prefix for persisted entries.
    pub storage_prefix: String,

    /// Seconds a popup attempt may stay pending before it is abandoned.
    pub popup_timeout_secs: u64,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Override the REST host.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the authorization host.
    pub fn with_auth_endpoint(mut self, url: impl Into<String>) -> Self {
        self.auth_endpoint = url.into();
        self
    }

    /// Override the storage prefix.
    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    /// Override the API version.
    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Override the popup timeout.
    pub fn with_popup_timeout(mut self, timeout: Duration) -> Self {
        self.popup_timeout_secs = timeout.as_secs();
        self
    }

    /// Popup timeout as a [`Duration`].
    pub fn popup_timeout(&self) -> Duration {
        Duration::from_secs(self.popup_timeout_secs)
    }

    /// Full REST URL for `path`, leading slashes stripped.
    pub fn rest_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            path.trim_start_matches('/')
        )
    }

    /// Authorization URL carrying `response_type=token`, the key, then `args`.
    pub fn authorize_url<K, V>(&self, args: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: Vec<(&str, &str)> = vec![
            ("response_type", "token"),
            ("key", self.api_key.as_str()),
        ];
        params.extend(args.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));

        codec::authorize_url(&self.auth_endpoint, self.api_version, &params)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: 1,
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            popup_timeout_secs: DEFAULT_POPUP_TIMEOUT_SECS,
        }
    }
}
