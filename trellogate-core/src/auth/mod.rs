//! Implicit-grant authorization.
//!
//! This module provides:
//! - [`AuthOptions`] - per-call options (flow, persistence, scope, ...)
//! - [`AuthStateMachine`] - recovers or obtains a token via redirect or popup
//! - [`ClientState`] - the token slot and the single live attempt
//! - [`AuthError`] / [`AuthOutcome`] - how an attempt ends
//!
//! # Attempt lifecycle
//!
//! ```text
//! Idle -> Resolving{redirect|popup} -> Authorized | Rejected
//! ```
//!
//! Every `authorize` call starts from `Idle`. Starting one aborts any popup
//! attempt still waiting for its callback.

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;
use crate::window::WindowError;

mod machine;
mod options;
mod state;

pub use machine::{redirect_url, AuthStateMachine, TOKEN_KEY};
pub use options::{AuthOptions, FlowType, Scope, DEFAULT_EXPIRATION};
pub use state::{AttemptId, ClientState};

pub(crate) use machine::AuthContext;
pub(crate) use state::AbortReason;

/// Error type for authorization attempts.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token is available and prompting was disabled.
    #[error("authorization required: no token available and interactive mode is off")]
    AuthorizationRequired,

    /// The popup callback carried something other than a token.
    #[error("authorization denied")]
    AuthorizationDenied,

    /// A newer `authorize` call replaced this attempt.
    #[error("authorization attempt {0} was superseded")]
    Superseded(AttemptId),

    /// The attempt was cancelled explicitly or the client was deauthorized.
    #[error("authorization attempt cancelled")]
    Cancelled,

    /// No popup callback arrived in time.
    #[error("authorization popup timed out after {0:?}")]
    TimedOut(Duration),

    /// A window capability failed.
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// Reading or writing the persisted token failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Where a recovered or obtained token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Parsed out of the location fragment after a redirect.
    Fragment,
    /// Already held by the client.
    Memory,
    /// Loaded from persistent storage.
    Storage,
    /// Delivered by the popup callback.
    Popup,
}

/// Successful end of an `authorize` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A token is now held.
    Authorized(TokenSource),

    /// The window was sent to the consent screen.
    ///
    /// In a browser the page unloads here; the token arrives in the fragment
    /// of the reloaded page and the next `authorize` call picks it up.
    Redirected { url: String },
}

impl AuthOutcome {
    /// Whether a token is held after this outcome.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }
}
