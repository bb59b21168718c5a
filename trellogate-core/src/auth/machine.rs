//! The authorization state machine.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use super::state::{AbortReason, AttemptGuard};
use super::{AttemptId, AuthError, AuthOptions, AuthOutcome, ClientState, FlowType, TokenSource};
use crate::codec;
use crate::config::ClientConfig;
use crate::store::{ScopedStorage, Secret};
use crate::window::{
    Location, MessageChannel, MessageEvent, MessageSubscription, PopupFeatures, WindowError,
    WindowId, WindowOpener,
};

/// Storage key of the persisted token.
pub const TOKEN_KEY: &str = "token";

/// Borrowed client pieces an attempt reads and writes.
pub(crate) struct AuthContext<'a> {
    pub config: ClientConfig,
    pub state: &'a ClientState,
    pub storage: &'a ScopedStorage,
}

/// Obtains tokens through the injected window capabilities.
///
/// Holds no token itself; every call works against the [`ClientState`] and
/// storage handed in by the client.
pub struct AuthStateMachine {
    location: Arc<dyn Location>,
    opener: Option<Arc<dyn WindowOpener>>,
    messages: MessageChannel,
}

impl AuthStateMachine {
    pub fn new(
        location: Arc<dyn Location>,
        opener: Option<Arc<dyn WindowOpener>>,
        messages: MessageChannel,
    ) -> Self {
        Self {
            location,
            opener,
            messages,
        }
    }

    /// The channel the host posts message events into.
    pub fn messages(&self) -> &MessageChannel {
        &self.messages
    }

    /// The current location.
    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    /// Run one attempt to completion.
    pub(crate) async fn authorize(
        &self,
        cx: AuthContext<'_>,
        options: AuthOptions,
    ) -> Result<AuthOutcome, AuthError> {
        let (attempt, abort) = cx.state.begin_attempt();
        debug!(attempt = %attempt.id(), flow = ?options.flow, "authorization attempt started");

        if let Some(source) = self.recover_token(&cx, &attempt, &options).await? {
            info!(attempt = %attempt.id(), ?source, "authorized without prompting");
            return Ok(AuthOutcome::Authorized(source));
        }

        if !options.interactive {
            debug!(attempt = %attempt.id(), "no token and interactive mode is off");
            return Err(AuthError::AuthorizationRequired);
        }

        match options.flow {
            FlowType::Redirect => self.redirect(&cx, &options),
            FlowType::Popup => self.popup(&cx, attempt, abort, &options).await,
        }
    }

    /// Look for a token in the fragment, in memory, then in storage.
    ///
    /// A token found anywhere is adopted (and persisted when requested)
    /// without contacting the authorization endpoint.
    async fn recover_token(
        &self,
        cx: &AuthContext<'_>,
        attempt: &AttemptGuard<'_>,
        options: &AuthOptions,
    ) -> Result<Option<TokenSource>, AuthError> {
        let recovered = match codec::extract_fragment_token(&self.location.fragment()) {
            Some(found) => {
                self.location.set_fragment(&found.remaining);
                Some((found.token, TokenSource::Fragment))
            }
            None => match cx.state.token() {
                Some(token) => Some((token, TokenSource::Memory)),
                None if options.persist => cx
                    .storage
                    .read(TOKEN_KEY)
                    .await?
                    .filter(|token| !token.is_empty())
                    .map(|token| (token, TokenSource::Storage)),
                None => None,
            },
        };

        let Some((token, source)) = recovered else {
            return Ok(None);
        };

        if !cx.state.settle(attempt.id(), Some(token.clone())) {
            return Err(AuthError::Superseded(attempt.id()));
        }
        if options.persist {
            persist(cx, &token).await?;
        }

        Ok(Some(source))
    }

    fn redirect(
        &self,
        cx: &AuthContext<'_>,
        options: &AuthOptions,
    ) -> Result<AuthOutcome, AuthError> {
        let url = redirect_url(&cx.config, &self.location.href(), options);

        self.location.navigate(&url)?;
        info!("redirecting to authorization endpoint");

        Ok(AuthOutcome::Redirected { url })
    }

    async fn popup(
        &self,
        cx: &AuthContext<'_>,
        attempt: AttemptGuard<'_>,
        abort: oneshot::Receiver<AbortReason>,
        options: &AuthOptions,
    ) -> Result<AuthOutcome, AuthError> {
        let opener = self
            .opener
            .as_ref()
            .ok_or_else(|| WindowError::PopupBlocked("no window opener configured".to_string()))?;

        let url = cx.config.authorize_url(&flow_args(
            ("return_url", self.location.origin()),
            "postMessage",
            options,
        ));
        let features = PopupFeatures::centered(opener.viewport());

        // Listen before opening so an immediate callback is not missed.
        let mut listener = self.messages.subscribe();
        let popup = opener.open(&url, &features)?;
        let popup_id = popup.id();
        let id = attempt.id();
        debug!(attempt = %id, popup = %popup_id, "popup opened");

        let timeout = cx.config.popup_timeout();
        let endpoint = cx.config.auth_endpoint.as_str();
        let waited = tokio::time::timeout(timeout, async {
            tokio::select! {
                reason = abort => Err(abort_error(id, reason.ok())),
                event = wait_for_callback(&mut listener, endpoint, popup_id) => {
                    event.ok_or(AuthError::Cancelled)
                }
            }
        })
        .await;

        drop(listener);
        popup.close();

        let event = match waited {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                info!(attempt = %id, "popup attempt ended: {}", e);
                return Err(e);
            }
            Err(_) => {
                info!(attempt = %id, "popup attempt timed out");
                return Err(AuthError::TimedOut(timeout));
            }
        };

        if codec::is_token(&event.data) {
            let token = Secret::new(event.data);
            if !cx.state.settle(id, Some(token.clone())) {
                return Err(AuthError::Superseded(id));
            }
            if options.persist {
                persist(cx, &token).await?;
            }
            info!(attempt = %id, "authorized through popup");
            Ok(AuthOutcome::Authorized(TokenSource::Popup))
        } else {
            if !cx.state.settle(id, None) {
                return Err(AuthError::Superseded(id));
            }
            info!(attempt = %id, "popup callback denied authorization");
            Err(AuthError::AuthorizationDenied)
        }
    }
}

impl std::fmt::Debug for AuthStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStateMachine")
            .field("href", &self.location.href())
            .field("has_opener", &self.opener.is_some())
            .finish()
    }
}

/// Consent URL of the redirect flow, sending the browser back to
/// `redirect_uri` with the token in the fragment.
pub fn redirect_url(config: &ClientConfig, redirect_uri: &str, options: &AuthOptions) -> String {
    config.authorize_url(&flow_args(
        ("redirect_uri", redirect_uri.to_string()),
        "fragment",
        options,
    ))
}

/// Mirror `token` into storage, then make sure it was not revoked meanwhile.
///
/// A `deauthorize` that runs while the write is pending clears memory and
/// storage first; the late write must not bring the token back.
async fn persist(cx: &AuthContext<'_>, token: &Secret) -> Result<(), AuthError> {
    cx.storage.write(TOKEN_KEY, Some(token)).await?;

    if cx.state.token().as_ref() == Some(token) {
        return Ok(());
    }

    debug!("token replaced while it was being stored, removing stored copy");
    if cx.storage.read(TOKEN_KEY).await?.as_ref() == Some(token) {
        cx.storage.write(TOKEN_KEY, None).await?;
    }
    Err(AuthError::Cancelled)
}

/// Query arguments shared by both flows, in the order the endpoint expects.
fn flow_args(
    callback: (&'static str, String),
    callback_method: &'static str,
    options: &AuthOptions,
) -> Vec<(&'static str, String)> {
    let mut args = vec![
        callback,
        ("callback_method", callback_method.to_string()),
        ("scope", options.scope.to_param()),
        ("expiration", options.expiration.clone()),
    ];
    if let Some(name) = &options.name {
        args.push(("name", name.clone()));
    }
    args
}

fn abort_error(id: AttemptId, reason: Option<AbortReason>) -> AuthError {
    match reason {
        Some(AbortReason::Superseded) => AuthError::Superseded(id),
        Some(AbortReason::Cancelled) | None => AuthError::Cancelled,
    }
}

/// Wait for a message from `popup` at `endpoint`, ignoring everything else.
async fn wait_for_callback(
    listener: &mut MessageSubscription,
    endpoint: &str,
    popup: WindowId,
) -> Option<MessageEvent> {
    while let Some(event) = listener.next().await {
        if event.origin == endpoint && event.source == popup {
            return Some(event);
        }
        trace!(origin = %event.origin, "ignoring message from unrelated window");
    }
    None
}
