//! Options accepted by `authorize`.

use serde::{Deserialize, Serialize};

/// Default token lifetime requested from the authorization endpoint.
pub const DEFAULT_EXPIRATION: &str = "30days";

/// How the user is sent to the consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// Navigate the current window; the token returns in the fragment.
    #[default]
    Redirect,
    /// Open a popup; the token returns as a cross-window message.
    Popup,
}

/// Requested permissions, kept in insertion order.
///
/// The default grants `read` only, with `write` and `account` present but off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope(Vec<(String, bool)>);

impl Scope {
    /// A scope with no flags at all.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Set `flag`, keeping its original position if it is already present.
    pub fn with(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        let flag = flag.into();
        match self.0.iter_mut().find(|(name, _)| *name == flag) {
            Some(entry) => entry.1 = enabled,
            None => self.0.push((flag, enabled)),
        }
        self
    }

    /// Whether `flag` is present and enabled.
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.0.iter().any(|(name, enabled)| name == flag && *enabled)
    }

    /// Enabled flags joined by commas, in insertion order.
    pub fn to_param(&self) -> String {
        self.0
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::empty()
            .with("read", true)
            .with("write", false)
            .with("account", false)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_param())
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for Scope {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |scope, (flag, enabled)| scope.with(flag, enabled))
    }
}

/// Options for one `authorize` call.
///
/// Start from [`AuthOptions::default`] and override fields individually; the
/// scope is replaced as a whole by [`with_scope`](Self::with_scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    /// Redirect or popup.
    #[serde(rename = "type")]
    pub flow: FlowType,

    /// Read and write the persisted token.
    pub persist: bool,

    /// Allow prompting the user when no token is available.
    pub interactive: bool,

    /// Requested permissions.
    pub scope: Scope,

    /// Token lifetime hint, e.g. `1hour`, `30days`, `never`.
    pub expiration: String,

    /// Application name shown on the consent screen.
    pub name: Option<String>,
}

impl AuthOptions {
    /// Use the popup flow.
    pub fn popup() -> Self {
        Self::default().with_flow(FlowType::Popup)
    }

    /// Use the redirect flow.
    pub fn redirect() -> Self {
        Self::default()
    }

    pub fn with_flow(mut self, flow: FlowType) -> Self {
        self.flow = flow;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Replace the whole scope.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
        self.expiration = expiration.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            flow: FlowType::Redirect,
            persist: true,
            interactive: true,
            scope: Scope::default(),
            expiration: DEFAULT_EXPIRATION.to_string(),
            name: None,
        }
    }
}
