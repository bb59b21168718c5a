//! Request signing for REST calls.
//!
//! Every call carries the application key and, when held, the user token.
//! `GET`/`HEAD` put them in a raw (unencoded) query string; every other
//! method sends them, together with the caller's parameters, as a JSON body.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::codec;
use crate::config::ClientConfig;
use crate::store::Secret;
use crate::transport::{HttpRequest, RequestMode, Transport};

/// Error type for REST calls.
#[derive(Debug, Error)]
pub enum RestError {
    /// No response was obtained.
    #[error("transport failure: {message}")]
    TransportFailure { message: String },

    /// The response body was not JSON.
    #[error("malformed response (status {status}): {source}")]
    MalformedResponse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ordered request parameters.
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value without moving it.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Overlay `other`; its values win on collisions.
    pub fn merge(&mut self, other: Params) {
        for (key, value) in other.0 {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One REST call before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub method: String,
    pub path: String,
    pub params: Params,
}

impl RestRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Whether credentials travel in the query string.
    pub fn uses_query_string(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET") || self.method.eq_ignore_ascii_case("HEAD")
    }
}

/// Attach credentials and serialize `request` against `config`.
///
/// An absent token is omitted rather than sent empty.
pub fn sign(
    config: &ClientConfig,
    token: Option<&Secret>,
    request: &RestRequest,
) -> Result<HttpRequest, RestError> {
    let mut data = Params::new().with("key", config.api_key.as_str());
    if let Some(token) = token {
        data.insert("token", token.expose());
    }
    data.merge(request.params.clone());

    let mut url = config.rest_url(&request.path);
    let body = if request.uses_query_string() {
        url.push('?');
        url.push_str(&codec::raw_query_string(data.iter()));
        None
    } else {
        Some(serde_json::to_string(&data)?)
    };

    Ok(HttpRequest {
        method: request.method.clone(),
        url,
        headers: vec![("Accept".to_string(), "application/json".to_string())],
        body,
        mode: RequestMode::Cors,
    })
}

/// Send a signed request and parse the body as JSON.
///
/// The status code is not interpreted: any response with a JSON body
/// resolves.
pub async fn dispatch(transport: &dyn Transport, request: HttpRequest) -> Result<Value, RestError> {
    tracing::debug!(method = %request.method, url = %redact_token(&request.url), "sending request");

    let response = transport.send(request).await?;
    serde_json::from_str(&response.body).map_err(|source| RestError::MalformedResponse {
        status: response.status,
        source,
    })
}

fn redact_token(url: &str) -> String {
    match url.find("token=") {
        Some(idx) => {
            let start = idx + "token=".len();
            let end = url[start..].find('&').map_or(url.len(), |i| start + i);
            format!("{}[REDACTED]{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}

type SuccessHandler<'a> = Box<dyn FnOnce(&Value) + Send + 'a>;
type ErrorHandler<'a> = Box<dyn FnOnce(&RestError) + Send + 'a>;

/// Callbacks attached to a call.
///
/// With an error handler a failure is handed to it and the call resolves to
/// `Value::Null`; without one the failure is returned.
#[derive(Default)]
pub struct Handlers<'a> {
    pub on_success: Option<SuccessHandler<'a>>,
    pub on_error: Option<ErrorHandler<'a>>,
}

impl<'a> Handlers<'a> {
    pub(crate) fn settle(self, result: Result<Value, RestError>) -> Result<Value, RestError> {
        match result {
            Ok(value) => {
                if let Some(on_success) = self.on_success {
                    on_success(&value);
                }
                Ok(value)
            }
            Err(e) => match self.on_error {
                Some(on_error) => {
                    on_error(&e);
                    Ok(Value::Null)
                }
                None => Err(e),
            },
        }
    }
}

/// Something that can sign and send a [`RestRequest`].
///
/// Implemented by the client; [`RestCall`] drives it.
pub trait RestSender: Send + Sync {
    fn send_request<'a>(
        &'a self,
        request: RestRequest,
        handlers: Handlers<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RestError>> + Send + 'a>>;
}

/// A REST call under construction.
///
/// Await it directly:
///
/// ```rust,ignore
/// let me = client.get("members/me").param("fields", "fullName").await?;
/// ```
#[must_use = "a RestCall does nothing until awaited"]
pub struct RestCall<'a> {
    sender: &'a dyn RestSender,
    request: RestRequest,
    handlers: Handlers<'a>,
}

impl<'a> RestCall<'a> {
    pub fn new(
        sender: &'a dyn RestSender,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            request: RestRequest::new(method, path),
            handlers: Handlers::default(),
        }
    }

    /// Add all of `params`; later values win.
    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.request.params.merge(params.into());
        self
    }

    /// Add one parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.insert(key, value);
        self
    }

    /// Called with the parsed body on success.
    pub fn on_success(mut self, handler: impl FnOnce(&Value) + Send + 'a) -> Self {
        self.handlers.on_success = Some(Box::new(handler));
        self
    }

    /// Called on failure; the call then resolves to `Value::Null`.
    pub fn on_error(mut self, handler: impl FnOnce(&RestError) + Send + 'a) -> Self {
        self.handlers.on_error = Some(Box::new(handler));
        self
    }

    /// The request as it will be signed.
    pub fn request(&self) -> &RestRequest {
        &self.request
    }

    pub async fn send(self) -> Result<Value, RestError> {
        self.sender.send_request(self.request, self.handlers).await
    }
}

impl<'a> IntoFuture for RestCall<'a> {
    type Output = Result<Value, RestError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        self.sender.send_request(self.request, self.handlers)
    }
}
