//! Prefix-namespaced view over a [`SecretStore`].

use std::sync::Arc;

use super::{Secret, SecretStore, StoreError};

/// Reads and writes single values under `{prefix}{key}`.
///
/// The prefix keeps client entries apart from unrelated data sharing the same
/// storage domain. Writing `None` removes the entry instead of storing a
/// sentinel.
#[derive(Clone)]
pub struct ScopedStorage {
    store: Arc<dyn SecretStore>,
    prefix: String,
}

impl ScopedStorage {
    /// Wrap `store`, namespacing every key with `prefix`.
    pub fn new(store: Arc<dyn SecretStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read the value stored under `key`, if any.
    pub async fn read(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        self.store.get(&self.scoped_key(key)).await
    }

    /// Write `value` under `key`; `None` deletes the entry.
    pub async fn write(&self, key: &str, value: Option<&Secret>) -> Result<(), StoreError> {
        let scoped = self.scoped_key(key);
        match value {
            Some(secret) => self.store.set(&scoped, secret).await,
            None => self.store.delete(&scoped).await,
        }
    }
}

impl std::fmt::Debug for ScopedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStorage")
            .field("prefix", &self.prefix)
            .finish()
    }
}
