//! Top-level error types for Trellogate.

use thiserror::Error;

use crate::auth::AuthError;
use crate::rest::RestError;
use crate::store::StoreError;

/// Top-level error type encompassing all Trellogate errors.
#[derive(Debug, Error)]
pub enum TrellogateError {
    /// Error from token storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from an authorization attempt.
    #[error("authorization error: {0}")]
    Auth(#[from] AuthError),

    /// Error from a REST call.
    #[error("request error: {0}")]
    Rest(#[from] RestError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
