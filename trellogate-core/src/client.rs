use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{
    self, AbortReason, AuthContext, AuthError, AuthOptions, AuthOutcome, AuthStateMachine,
    ClientState, TOKEN_KEY,
};
use crate::config::ClientConfig;
use crate::error::TrellogateError;
use crate::ready::ReadinessRegistry;
use crate::rest::{self, Handlers, RestCall, RestError, RestRequest, RestSender};
use crate::store::{MemoryStore, ScopedStorage, Secret, SecretStore};
use crate::transport::Transport;
use crate::window::{Location, MemoryLocation, MessageChannel, WindowOpener};

/// Readiness name signalled whenever a token is obtained.
const TOKEN_READY: &str = "token";

/// Client for the Trello REST API.
///
/// Owns the current token. Storage is only a durable mirror of it: the
/// in-memory value wins until the next `authorize` reloads it.
///
/// # Example
///
/// ```rust,ignore
/// use trellogate_core::{AuthOptions, TrelloClient};
///
/// let client = TrelloClient::builder("my-app-key").build()?;
/// client.authorize(AuthOptions::default().interactive(false)).await?;
///
/// let me = client.get("members/me").param("fields", "fullName").await?;
/// println!("{}", me["fullName"]);
/// ```
pub struct TrelloClient {
    config: RwLock<ClientConfig>,
    state: ClientState,
    storage: ScopedStorage,
    transport: Arc<dyn Transport>,
    auth: AuthStateMachine,
    ready: ReadinessRegistry<()>,
}

impl TrelloClient {
    /// Start building a client for `api_key` with default endpoints.
    pub fn builder(api_key: impl Into<String>) -> TrelloClientBuilder {
        TrelloClientBuilder::new(ClientConfig::new(api_key))
    }

    /// The application key.
    pub fn key(&self) -> String {
        self.config.read().api_key.clone()
    }

    /// Rotate the application key.
    pub fn set_key(&self, key: impl Into<String>) {
        self.config.write().api_key = key.into();
    }

    /// The API version segment.
    pub fn version(&self) -> u32 {
        self.config.read().api_version
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// The current token.
    pub fn token(&self) -> Option<Secret> {
        self.state.token()
    }

    /// Replace the in-memory token without touching storage.
    ///
    /// `when_authorized` follows the new value: setting a token wakes its
    /// waiters, clearing it makes later waiters block.
    pub fn set_token(&self, token: Option<Secret>) {
        let present = token.is_some();
        self.state.set_token(token);
        if present {
            self.ready.mark_ready(TOKEN_READY, ());
        } else {
            self.ready.reset(TOKEN_READY);
        }
    }

    /// Whether a token is held.
    pub fn authorized(&self) -> bool {
        self.state.has_token()
    }

    /// Where message events from popups must be posted.
    pub fn messages(&self) -> &MessageChannel {
        self.auth.messages()
    }

    /// Authorization URL for `args`, prefixed with the token response type
    /// and the application key.
    pub fn authorize_url<K, V>(&self, args: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.config.read().authorize_url(args)
    }

    /// Consent URL the redirect flow would navigate to, sending the browser
    /// back to `redirect_uri`.
    pub fn redirect_url(&self, redirect_uri: &str, options: &AuthOptions) -> String {
        auth::redirect_url(&self.config.read(), redirect_uri, options)
    }

    /// Recover or obtain a token.
    ///
    /// Any popup attempt still pending is aborted first.
    pub async fn authorize(&self, options: AuthOptions) -> Result<AuthOutcome, AuthError> {
        let cx = AuthContext {
            config: self.config(),
            state: &self.state,
            storage: &self.storage,
        };

        let outcome = self.auth.authorize(cx, options).await?;
        if outcome.is_authorized() {
            self.ready.mark_ready(TOKEN_READY, ());
        }
        Ok(outcome)
    }

    /// Forget the token, in memory and in storage.
    ///
    /// Also cancels a pending popup attempt. Never fails; a storage error is
    /// logged and otherwise ignored.
    ///
    /// This is `async` because deleting from a [`SecretStore`] is. The
    /// in-memory token and any pending attempt are cleared before the first
    /// await, so `authorized()` is already false while the delete runs.
    pub async fn deauthorize(&self) {
        if let Some(attempt) = self.state.abort_live(AbortReason::Cancelled) {
            debug!(%attempt, "cancelled live attempt on deauthorize");
        }
        self.state.set_token(None);
        self.ready.reset(TOKEN_READY);

        if let Err(e) = self.storage.write(TOKEN_KEY, None).await {
            warn!("failed to clear persisted token: {}", e);
        }
        info!("deauthorized");
    }

    /// Cancel the pending popup attempt, if any.
    ///
    /// Returns whether an attempt was cancelled.
    pub fn cancel_authorization(&self) -> bool {
        self.state.abort_live(AbortReason::Cancelled).is_some()
    }

    /// Wait until a token has been obtained.
    ///
    /// Resolves immediately if an attempt already succeeded and the client
    /// has not been deauthorized since.
    pub async fn when_authorized(&self) {
        self.ready.wait_until(TOKEN_READY).await
    }

    /// Start a call with an arbitrary method.
    pub fn request(&self, method: impl Into<String>, path: impl Into<String>) -> RestCall<'_> {
        RestCall::new(self, method, path)
    }

    pub fn get(&self, path: impl Into<String>) -> RestCall<'_> {
        self.request("GET", path)
    }

    pub fn put(&self, path: impl Into<String>) -> RestCall<'_> {
        self.request("PUT", path)
    }

    pub fn post(&self, path: impl Into<String>) -> RestCall<'_> {
        self.request("POST", path)
    }

    pub fn delete(&self, path: impl Into<String>) -> RestCall<'_> {
        self.request("DELETE", path)
    }

    async fn execute(&self, request: RestRequest) -> Result<Value, RestError> {
        let signed = {
            let config = self.config.read();
            rest::sign(&config, self.state.token().as_ref(), &request)?
        };
        rest::dispatch(self.transport.as_ref(), signed).await
    }
}

impl RestSender for TrelloClient {
    fn send_request<'a>(
        &'a self,
        request: RestRequest,
        handlers: Handlers<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RestError>> + Send + 'a>> {
        Box::pin(async move {
            let result = self.execute(request).await;
            handlers.settle(result)
        })
    }
}

impl std::fmt::Debug for TrelloClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrelloClient")
            .field("config", &*self.config.read())
            .field("state", &self.state)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Builder for creating a [`TrelloClient`] with custom capabilities.
pub struct TrelloClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn SecretStore>>,
    location: Option<Arc<dyn Location>>,
    opener: Option<Arc<dyn WindowOpener>>,
    messages: MessageChannel,
}

impl TrelloClientBuilder {
    /// Create a builder from a full configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            location: None,
            opener: None,
            messages: MessageChannel::new(),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// HTTP transport; defaults to reqwest with the `http` feature.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persistent store; defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Current page location; defaults to an in-memory `http://localhost/`.
    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    /// Popup opener; without one the popup flow fails.
    pub fn window_opener(mut self, opener: Arc<dyn WindowOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Message channel the host posts into.
    pub fn messages(mut self, messages: MessageChannel) -> Self {
        self.messages = messages;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<TrelloClient, TrellogateError> {
        if self.config.api_key.trim().is_empty() {
            return Err(TrellogateError::Config {
                message: "an API key is required".to_string(),
            });
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn SecretStore>);
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(MemoryLocation::default()) as Arc<dyn Location>);

        let storage = ScopedStorage::new(store, self.config.storage_prefix.clone());
        let auth = AuthStateMachine::new(location, self.opener, self.messages);

        Ok(TrelloClient {
            config: RwLock::new(self.config),
            state: ClientState::new(),
            storage,
            transport,
            auth,
            ready: ReadinessRegistry::new(),
        })
    }
}

#[cfg(feature = "http")]
fn default_transport() -> Result<Arc<dyn Transport>, TrellogateError> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Result<Arc<dyn Transport>, TrellogateError> {
    Err(TrellogateError::Config {
        message: "no transport configured and the http feature is disabled".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::transport::{HttpRequest, HttpResponse};
    use parking_lot::Mutex;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    /// Records requests and answers with a fixed body.
    struct RecordingTransport {
        requests: Mutex<Vec<HttpRequest>>,
        body: String,
    }

    impl RecordingTransport {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                body: body.to_string(),
            })
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RestError> {
            self.requests.lock().push(request);
            Ok(HttpResponse {
                status: 200,
                body: self.body.clone(),
            })
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, RestError> {
            Err(RestError::TransportFailure {
                message: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_builder_requires_key() {
        let result = TrelloClient::builder("  ").build();
        assert!(matches!(result, Err(TrellogateError::Config { .. })));
    }

    #[test]
    fn test_key_rotation() {
        let client = TrelloClient::builder("abc")
            .transport(RecordingTransport::new("{}"))
            .build()
            .unwrap();
        assert_eq!(client.key(), "abc");
        assert_eq!(client.version(), 1);

        client.set_key("def");
        assert_eq!(client.key(), "def");
        assert!(client.authorize_url(&[("scope", "read")]).contains("key=def"));
    }

    #[tokio::test]
    async fn test_get_signs_with_current_token() {
        let transport = RecordingTransport::new(r#"{"id": "m1"}"#);
        let client = TrelloClient::builder("abc")
            .transport(transport.clone())
            .build()
            .unwrap();
        client.set_token(Some(Secret::new(TOKEN)));

        let value = client.get("/members/me").await.unwrap();
        assert_eq!(value["id"], "m1");

        let requests = transport.requests.lock();
        assert_eq!(
            requests[0].url,
            format!("https://api.trello.com/1/members/me?key=abc&token={}", TOKEN)
        );
        assert_eq!(requests[0].method, "GET");
    }

    #[tokio::test]
    async fn test_success_handler_sees_value() {
        let client = TrelloClient::builder("abc")
            .transport(RecordingTransport::new(r#"[1, 2]"#))
            .build()
            .unwrap();

        let mut seen = None;
        let value = client
            .post("cards")
            .param("name", "x")
            .on_success(|v| seen = Some(v.clone()))
            .await
            .unwrap();

        assert_eq!(value, serde_json::json!([1, 2]));
        assert_eq!(seen, Some(serde_json::json!([1, 2])));
    }

    #[tokio::test]
    async fn test_transport_failure_without_handler_is_returned() {
        let client = TrelloClient::builder("abc")
            .transport(Arc::new(FailingTransport))
            .build()
            .unwrap();

        let result = client.delete("cards/1").await;
        assert!(matches!(result, Err(RestError::TransportFailure { .. })));
    }

    #[tokio::test]
    async fn test_transport_failure_goes_to_error_handler() {
        let client = TrelloClient::builder("abc")
            .transport(Arc::new(FailingTransport))
            .build()
            .unwrap();

        let mut failed = false;
        let value = client
            .put("cards/1")
            .on_error(|_| failed = true)
            .await
            .unwrap();

        assert!(failed);
        assert_eq!(value, Value::Null);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_token_drives_when_authorized() {
        let client = TrelloClient::builder("abc")
            .transport(RecordingTransport::new("{}"))
            .build()
            .unwrap();

        client.set_token(Some(Secret::new(TOKEN)));
        client.when_authorized().await;

        client.set_token(None);
        let waited = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            client.when_authorized(),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let client = TrelloClient::builder("abc")
            .transport(RecordingTransport::new("invalid key"))
            .build()
            .unwrap();

        let result = client.get("members/me").await;
        assert!(matches!(
            result,
            Err(RestError::MalformedResponse { status: 200, .. })
        ));
    }
}
