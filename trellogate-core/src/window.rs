//! Window capabilities the authorization flow is driven through.
//!
//! The client never talks to a browser directly. A host supplies:
//! - [`Location`] - the current page URL and its fragment, plus navigation
//! - [`WindowOpener`] - opens popup windows and reports the viewport
//! - [`MessageChannel`] - the host posts cross-window messages into it
//!
//! [`MemoryLocation`] is an in-process location for tests and terminal hosts.

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::codec;

/// Popup width in CSS pixels.
pub const POPUP_WIDTH: i32 = 420;

/// Popup height in CSS pixels.
pub const POPUP_HEIGHT: i32 = 470;

/// Name given to the popup window.
pub const POPUP_NAME: &str = "trello";

const MESSAGE_BUFFER: usize = 64;

/// Errors raised by window capabilities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The popup could not be opened.
    #[error("popup blocked: {0}")]
    PopupBlocked(String),

    /// Navigation to a new URL failed.
    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// Identity of a window, compared against a message's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(Uuid);

impl WindowId {
    /// A fresh, unique window identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access to the current page location.
pub trait Location: Send + Sync {
    /// The full current URL.
    fn href(&self) -> String;

    /// The fragment including its leading `#`, or an empty string.
    fn fragment(&self) -> String;

    /// Replace the fragment. An empty value removes it.
    fn set_fragment(&self, fragment: &str);

    /// Navigate the current window to `url`.
    fn navigate(&self, url: &str) -> Result<(), WindowError>;

    /// `scheme://host[:port]` of the current URL.
    fn origin(&self) -> String {
        codec::origin_of(&self.href()).unwrap_or_default()
    }
}

/// Screen position and inner size of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub screen_x: i32,
    pub screen_y: i32,
    pub inner_width: i32,
    pub inner_height: i32,
}

/// Placement of a popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    /// Target window name; reopening with the same name reuses the window.
    pub name: &'static str,
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub top: i32,
}

impl PopupFeatures {
    /// A fixed-size popup centered on `viewport`.
    pub fn centered(viewport: Viewport) -> Self {
        Self {
            name: POPUP_NAME,
            width: POPUP_WIDTH,
            height: POPUP_HEIGHT,
            left: viewport.screen_x + (viewport.inner_width - POPUP_WIDTH) / 2,
            top: viewport.screen_y + (viewport.inner_height - POPUP_HEIGHT) / 2,
        }
    }

    /// The `window.open` feature string.
    pub fn to_feature_string(&self) -> String {
        format!(
            "width={},height={},left={},top={}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Handle to an opened popup.
pub trait PopupWindow: Send + Sync {
    /// Identity messages from this popup carry as their source.
    fn id(&self) -> WindowId;

    /// Close the popup. Closing twice is harmless.
    fn close(&self);
}

/// Opens popup windows.
pub trait WindowOpener: Send + Sync {
    /// Current window geometry, used to center the popup.
    fn viewport(&self) -> Viewport;

    /// Open `url` in a new window placed per `features`.
    fn open(&self, url: &str, features: &PopupFeatures)
        -> Result<Box<dyn PopupWindow>, WindowError>;
}

/// A cross-window message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Origin of the sending window.
    pub origin: String,
    /// Identity of the sending window.
    pub source: WindowId,
    /// Message payload.
    pub data: String,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, source: WindowId, data: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            source,
            data: data.into(),
        }
    }
}

/// Message bus between the host and pending popup attempts.
///
/// The host calls [`post`](Self::post) for every message event the page
/// receives. Each popup attempt holds a [`MessageSubscription`]; dropping it
/// removes the listener.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    sender: broadcast::Sender<MessageEvent>,
}

impl MessageChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MESSAGE_BUFFER);
        Self { sender }
    }

    /// Deliver `event` to every registered listener.
    ///
    /// Returns the number of listeners that received it.
    pub fn post(&self, event: MessageEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Register a listener.
    pub fn subscribe(&self) -> MessageSubscription {
        MessageSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered message listener.
#[derive(Debug)]
pub struct MessageSubscription {
    receiver: broadcast::Receiver<MessageEvent>,
}

impl MessageSubscription {
    /// Wait for the next message. `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<MessageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "message listener lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process [`Location`].
///
/// Navigations are recorded instead of performed.
#[derive(Debug)]
pub struct MemoryLocation {
    state: RwLock<LocationState>,
}

#[derive(Debug)]
struct LocationState {
    base: String,
    fragment: String,
    navigations: Vec<String>,
}

impl MemoryLocation {
    /// A location at `href`; any `#...` suffix becomes the fragment.
    pub fn new(href: impl Into<String>) -> Self {
        let href = href.into();
        let (base, fragment) = match href.find('#') {
            Some(idx) => (href[..idx].to_string(), href[idx..].to_string()),
            None => (href, String::new()),
        };

        Self {
            state: RwLock::new(LocationState {
                base,
                fragment,
                navigations: Vec::new(),
            }),
        }
    }

    /// Every URL navigated to, oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.state.read().navigations.clone()
    }

    /// The most recent navigation target.
    pub fn last_navigation(&self) -> Option<String> {
        self.state.read().navigations.last().cloned()
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("http://localhost/")
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        let state = self.state.read();
        format!("{}{}", state.base, state.fragment)
    }

    fn fragment(&self) -> String {
        self.state.read().fragment.clone()
    }

    fn set_fragment(&self, fragment: &str) {
        let normalized = match fragment {
            "" | "#" => String::new(),
            f if f.starts_with('#') => f.to_string(),
            f => format!("#{}", f),
        };
        self.state.write().fragment = normalized;
    }

    fn navigate(&self, url: &str) -> Result<(), WindowError> {
        self.state.write().navigations.push(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_centered_on_viewport() {
        let features = PopupFeatures::centered(Viewport {
            screen_x: 100,
            screen_y: 50,
            inner_width: 1280,
            inner_height: 800,
        });

        assert_eq!(features.name, "trello");
        assert_eq!(features.width, 420);
        assert_eq!(features.height, 470);
        assert_eq!(features.left, 100 + (1280 - 420) / 2);
        assert_eq!(features.top, 50 + (800 - 470) / 2);
        assert_eq!(
            features.to_feature_string(),
            "width=420,height=470,left=530,top=215"
        );
    }

    #[test]
    fn test_memory_location_splits_fragment() {
        let location = MemoryLocation::new("https://app.example/boards#tab=1");
        assert_eq!(location.fragment(), "#tab=1");
        assert_eq!(location.origin(), "https://app.example");

        location.set_fragment("tab=2");
        assert_eq!(location.href(), "https://app.example/boards#tab=2");

        location.set_fragment("");
        assert_eq!(location.href(), "https://app.example/boards");
    }

    #[test]
    fn test_memory_location_records_navigation() {
        let location = MemoryLocation::default();
        location.navigate("https://trello.com/1/authorize").unwrap();
        assert_eq!(
            location.navigations(),
            vec!["https://trello.com/1/authorize".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dropping_subscription_deregisters() {
        let channel = MessageChannel::new();
        let subscription = channel.subscribe();
        assert_eq!(channel.listener_count(), 1);

        drop(subscription);
        assert_eq!(channel.listener_count(), 0);
        assert_eq!(
            channel.post(MessageEvent::new("https://trello.com", WindowId::new(), "x")),
            0
        );
    }

    #[tokio::test]
    async fn test_subscription_receives_posted_messages() {
        let channel = MessageChannel::new();
        let mut subscription = channel.subscribe();
        let source = WindowId::new();

        channel.post(MessageEvent::new("https://trello.com", source, "payload"));

        let event = subscription.next().await.unwrap();
        assert_eq!(event.source, source);
        assert_eq!(event.data, "payload");
    }
}
