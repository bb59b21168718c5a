//! The client's token slot and the bookkeeping for live attempts.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::store::Secret;

/// Identity of one `authorize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(Uuid);

impl AttemptId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a live attempt was stopped from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// A newer `authorize` call started.
    Superseded,
    /// `cancel_authorization` or `deauthorize` was called.
    Cancelled,
}

struct LiveAttempt {
    id: AttemptId,
    abort: oneshot::Sender<AbortReason>,
}

#[derive(Default)]
struct Inner {
    token: Option<Secret>,
    live: Option<LiveAttempt>,
}

/// Current token plus the one attempt allowed to write it.
///
/// Only one attempt is live at a time. Starting an attempt aborts the
/// previous one, and a settle from any attempt other than the live one is
/// discarded, so a stale popup can never overwrite a newer token.
#[derive(Default)]
pub struct ClientState {
    inner: Mutex<Inner>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token.
    pub fn token(&self) -> Option<Secret> {
        self.inner.lock().token.clone()
    }

    /// Whether a token is held.
    pub fn has_token(&self) -> bool {
        self.inner.lock().token.is_some()
    }

    /// Replace the token outside any attempt.
    pub fn set_token(&self, token: Option<Secret>) {
        self.inner.lock().token = token;
    }

    /// Identity of the live attempt, if any.
    pub fn live_attempt(&self) -> Option<AttemptId> {
        self.inner.lock().live.as_ref().map(|live| live.id)
    }

    /// Start a new attempt, aborting the previous live one.
    pub(crate) fn begin_attempt(&self) -> (AttemptGuard<'_>, oneshot::Receiver<AbortReason>) {
        let (abort, abort_rx) = oneshot::channel();
        let id = AttemptId::new();

        let previous = self.inner.lock().live.replace(LiveAttempt { id, abort });
        if let Some(previous) = previous {
            tracing::debug!(superseded = %previous.id, attempt = %id, "superseding live attempt");
            let _ = previous.abort.send(AbortReason::Superseded);
        }

        (AttemptGuard { state: self, id }, abort_rx)
    }

    /// Abort the live attempt, returning its identity.
    pub(crate) fn abort_live(&self, reason: AbortReason) -> Option<AttemptId> {
        let live = self.inner.lock().live.take()?;
        let _ = live.abort.send(reason);
        Some(live.id)
    }

    /// Write `token` on behalf of attempt `id` and retire it.
    ///
    /// Returns `false` without touching the token if `id` is no longer live.
    pub(crate) fn settle(&self, id: AttemptId, token: Option<Secret>) -> bool {
        let mut inner = self.inner.lock();
        if !inner.live.as_ref().is_some_and(|live| live.id == id) {
            return false;
        }
        inner.live = None;
        inner.token = token;
        true
    }

    fn end_attempt(&self, id: AttemptId) {
        let mut inner = self.inner.lock();
        if inner.live.as_ref().is_some_and(|live| live.id == id) {
            inner.live = None;
        }
    }
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ClientState")
            .field("token", &inner.token)
            .field("live_attempt", &inner.live.as_ref().map(|live| live.id))
            .finish()
    }
}

/// Retires its attempt when dropped, whatever path the attempt took.
pub(crate) struct AttemptGuard<'a> {
    state: &'a ClientState,
    id: AttemptId,
}

impl AttemptGuard<'_> {
    pub(crate) fn id(&self) -> AttemptId {
        self.id
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.state.end_attempt(self.id);
    }
}
