//! HTTP transport capability.
//!
//! The request signer builds a complete [`HttpRequest`] and hands it to a
//! [`Transport`]. [`ReqwestTransport`] (with the `http` feature) is the
//! default; tests and embedded hosts supply their own.

use async_trait::async_trait;

use crate::rest::RestError;

/// Request mode hint for hosts that enforce one (browsers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Cross-origin request.
    #[default]
    Cors,
    SameOrigin,
}

/// A fully signed request ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method name as given by the caller.
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub mode: RequestMode,
}

impl HttpRequest {
    /// Value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A transport-level response. The status is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends signed requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, returning whatever response came back.
    ///
    /// Only failures to obtain a response at all are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RestError>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use async_trait::async_trait;

    use super::{HttpRequest, HttpResponse, Transport};
    use crate::rest::RestError;

    /// [`Transport`] backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Use an existing client (proxies, timeouts, TLS settings).
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RestError> {
            let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
                .map_err(|e| RestError::TransportFailure {
                    message: format!("invalid method {}: {}", request.method, e),
                })?;

            // Native requests have no CORS mode; the hint is for browser hosts.
            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body);
            }

            let response = builder.send().await.map_err(|e| RestError::TransportFailure {
                message: format!("request to {} failed: {}", request.url, e),
            })?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| RestError::TransportFailure {
                message: format!("failed to read response body: {}", e),
            })?;

            Ok(HttpResponse { status, body })
        }
    }
}
