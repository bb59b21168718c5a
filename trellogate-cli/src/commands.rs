//! Command implementations shared by the binary and its tests.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;
use trellogate_core::{
    AuthError, AuthOptions, AuthOutcome, Location, Params, Scope, SecretStore, TrelloClient,
};

use crate::config::CliConfig;

/// Build a client without a window opener; a terminal only redirects.
pub fn build_client(
    config: &CliConfig,
    store: Arc<dyn SecretStore>,
    location: Arc<dyn Location>,
) -> Result<TrelloClient> {
    config.require_api_key()?;

    TrelloClient::builder(config.client.api_key.clone())
        .config(config.client.clone())
        .store(store)
        .location(location)
        .build()
        .context("Failed to build client")
}

/// Consent-screen choices given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConsentArgs {
    /// Comma-separated scope names; every name listed is granted.
    pub scope: Option<String>,
    pub expiration: Option<String>,
    pub name: Option<String>,
}

impl ConsentArgs {
    /// Redirect-flow options for these choices.
    pub fn to_options(&self) -> AuthOptions {
        let mut options = AuthOptions::redirect();
        if let Some(scope) = &self.scope {
            options = options.with_scope(parse_scope(scope));
        }
        if let Some(expiration) = &self.expiration {
            options = options.with_expiration(expiration.clone());
        }
        if let Some(name) = &self.name {
            options = options.with_name(name.clone());
        }
        options
    }
}

/// `read,write` -> a scope with exactly those flags enabled.
pub fn parse_scope(raw: &str) -> Scope {
    raw.split(',')
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
        .map(|flag| (flag.to_string(), true))
        .collect()
}

/// The consent URL the redirect flow would navigate to for `callback`.
pub fn consent_url(client: &TrelloClient, callback: &str, args: &ConsentArgs) -> String {
    client.redirect_url(callback, &args.to_options())
}

/// Recover a token from the location or storage without prompting.
///
/// Returns whether a token is now held.
pub async fn restore_session(client: &TrelloClient) -> Result<bool> {
    match client.authorize(AuthOptions::default().interactive(false)).await {
        Ok(outcome) => Ok(outcome.is_authorized()),
        Err(AuthError::AuthorizationRequired) => {
            debug!("no stored token");
            Ok(false)
        }
        Err(e) => Err(e).context("Failed to restore session"),
    }
}

/// Run the redirect flow once.
pub async fn authorize(client: &TrelloClient, options: AuthOptions) -> Result<AuthOutcome> {
    client
        .authorize(options)
        .await
        .context("Authorization failed")
}

/// Make one signed call, restoring a stored token first.
pub async fn call(
    client: &TrelloClient,
    method: &str,
    path: &str,
    params: Vec<(String, String)>,
) -> Result<Value> {
    if !restore_session(client).await? {
        debug!("calling without a token");
    }

    client
        .request(method, path)
        .params(params.into_iter().collect::<Params>())
        .await
        .with_context(|| format!("{} {} failed", method, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope() {
        let scope = parse_scope("read, account,,");
        assert_eq!(scope.to_param(), "read,account");
        assert!(!scope.is_enabled("write"));
    }

    #[test]
    fn test_consent_args_defaults() {
        let options = ConsentArgs::default().to_options();
        assert_eq!(options, AuthOptions::redirect());
    }
}
