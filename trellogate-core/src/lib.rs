//! # Trellogate Core
//!
//! Client library for the Trello REST API and its implicit-grant
//! authorization.
//!
//! This crate provides:
//! - An authorization state machine that recovers a token from the location
//!   fragment or storage, or obtains one through a redirect or a popup
//! - A request signer that attaches the application key and token to calls
//! - A scoped storage adapter mirroring the token into a persistent store
//! - Capability traits for the window primitives a host must supply
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellogate_core::{AuthOptions, TrelloClient};
//!
//! async fn whoami(client: &TrelloClient) -> Result<String, trellogate_core::TrellogateError> {
//!     client.authorize(AuthOptions::popup()).await?;
//!     let me = client.get("members/me").param("fields", "username").await?;
//!     Ok(me["username"].as_str().unwrap_or_default().to_string())
//! }
//! ```

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod ready;
pub mod rest;
pub mod store;
pub mod transport;
pub mod window;

mod client;

// Re-export commonly used types at crate root
pub use auth::{
    AttemptId,
    AuthError,
    AuthOptions,
    AuthOutcome,
    ClientState,
    FlowType,
    Scope,
    TokenSource,
};

pub use client::{TrelloClient, TrelloClientBuilder};

pub use config::ClientConfig;

pub use error::TrellogateError;

pub use ready::ReadinessRegistry;

pub use rest::{Params, RestCall, RestError, RestRequest};

pub use store::{
    create_store,
    MemoryStore,
    ScopedStorage,
    Secret,
    SecretStore,
    StoreError,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use transport::{HttpRequest, HttpResponse, RequestMode, Transport};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;

pub use window::{
    Location,
    MemoryLocation,
    MessageChannel,
    MessageEvent,
    PopupFeatures,
    PopupWindow,
    Viewport,
    WindowError,
    WindowId,
    WindowOpener,
};
