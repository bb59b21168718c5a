//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use trellogate_core::{
    HttpRequest, HttpResponse, MemoryLocation, MemoryStore, MessageChannel, PopupFeatures,
    PopupWindow, RestError, TrelloClient, TrelloClientBuilder, Transport, Viewport, WindowError,
    WindowId, WindowOpener,
};

pub const TOKEN: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
pub const OTHER_TOKEN: &str = "fedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210";
pub const AUTH_ORIGIN: &str = "https://trello.com";

/// A popup that only remembers whether it was closed.
pub struct FakePopup {
    id: WindowId,
    closed: Arc<AtomicBool>,
}

impl PopupWindow for FakePopup {
    fn id(&self) -> WindowId {
        self.id
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Handle on a popup the fake opener handed out.
#[derive(Clone)]
pub struct OpenedPopup {
    pub id: WindowId,
    pub url: String,
    pub features: PopupFeatures,
    closed: Arc<AtomicBool>,
}

impl OpenedPopup {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens fake popups and records each one.
pub struct FakeOpener {
    viewport: Viewport,
    blocked: bool,
    opened: Mutex<Vec<OpenedPopup>>,
}

impl FakeOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            viewport: Viewport {
                screen_x: 100,
                screen_y: 50,
                inner_width: 1280,
                inner_height: 800,
            },
            blocked: false,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn blocked() -> Arc<Self> {
        Arc::new(Self {
            viewport: Viewport::default(),
            blocked: true,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<OpenedPopup> {
        self.opened.lock().clone()
    }

    pub fn last(&self) -> Option<OpenedPopup> {
        self.opened.lock().last().cloned()
    }
}

impl WindowOpener for FakeOpener {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn open(
        &self,
        url: &str,
        features: &PopupFeatures,
    ) -> Result<Box<dyn PopupWindow>, WindowError> {
        if self.blocked {
            return Err(WindowError::PopupBlocked("blocked by test".to_string()));
        }

        let id = WindowId::new();
        let closed = Arc::new(AtomicBool::new(false));
        self.opened.lock().push(OpenedPopup {
            id,
            url: url.to_string(),
            features: *features,
            closed: closed.clone(),
        });

        Ok(Box::new(FakePopup { id, closed }))
    }
}

/// Transport that must never be reached.
pub struct UnreachableTransport {
    pub calls: Mutex<usize>,
}

impl UnreachableTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl Transport for UnreachableTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, RestError> {
        *self.calls.lock() += 1;
        Err(RestError::TransportFailure {
            message: "network disabled in tests".to_string(),
        })
    }
}

/// Everything a test needs to drive one client.
pub struct Harness {
    pub client: Arc<TrelloClient>,
    pub location: Arc<MemoryLocation>,
    pub opener: Arc<FakeOpener>,
    pub store: Arc<MemoryStore>,
    pub messages: MessageChannel,
}

impl Harness {
    pub fn new(href: &str) -> Self {
        Self::with_store(href, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(href: &str, store: Arc<MemoryStore>) -> Self {
        Self::build(href, store, FakeOpener::new(), |builder| builder)
    }

    pub fn build(
        href: &str,
        store: Arc<MemoryStore>,
        opener: Arc<FakeOpener>,
        customize: impl FnOnce(TrelloClientBuilder) -> TrelloClientBuilder,
    ) -> Self {
        let location = Arc::new(MemoryLocation::new(href));
        let messages = MessageChannel::new();

        let builder = TrelloClient::builder("abc")
            .transport(UnreachableTransport::new())
            .store(store.clone())
            .location(location.clone())
            .window_opener(opener.clone())
            .messages(messages.clone());
        let client = customize(builder).build().expect("client builds");

        Self {
            client: Arc::new(client),
            location,
            opener,
            store,
            messages,
        }
    }

    /// Wait until `count` popups are open and listened for.
    pub async fn wait_for_popup(&self, count: usize) -> OpenedPopup {
        for _ in 0..1000 {
            let opened = self.opener.opened();
            if opened.len() >= count && self.messages.listener_count() > 0 {
                return opened[count - 1].clone();
            }
            tokio::task::yield_now().await;
        }
        panic!("popup {} was never opened", count);
    }
}
