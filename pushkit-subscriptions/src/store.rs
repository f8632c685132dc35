//! Typed stores over a [`SharedStore`].
//!
//! [`CodableStore`] keeps JSON values under a key prefix. Each value is
//! written as `[format version][json]`. [`SubscriptionStore`] is the
//! subscription table built on it; it lives in the shared group namespace so
//! the notification extension can read counterparty metadata.

use std::marker::PhantomData;
use std::sync::Arc;

use pushkit_lib::storage::{SharedStore, StorageError};
use pushkit_lib::Topic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::types::PushSubscription;
use crate::Result;

/// Current codable value format version.
pub const CODABLE_FORMAT_VERSION: u8 = 1;

/// JSON values of one type under a key prefix.
pub struct CodableStore<T> {
    store: Arc<dyn SharedStore>,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CodableStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> CodableStore<T> {
    pub fn new(store: Arc<dyn SharedStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            _marker: PhantomData,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn set(&self, value: &T, key: &str) -> Result<()> {
        let mut bytes = vec![CODABLE_FORMAT_VERSION];
        serde_json::to_writer(&mut bytes, value)?;
        self.store.write(&self.full_key(key), &bytes)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.full_key(key);
        let Some(bytes) = self.store.read(&full_key)? else {
            return Ok(None);
        };
        Ok(Some(decode(&full_key, &bytes)?))
    }

    /// All decodable values. Undecodable records are logged and skipped.
    pub fn get_all(&self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for full_key in self.store.keys(&self.prefix)? {
            let Some(bytes) = self.store.read(&full_key)? else {
                continue;
            };
            match decode(&full_key, &bytes) {
                Ok(value) => values.push(value),
                Err(e) => warn!(key = %full_key, error = %e, "skipping undecodable record"),
            }
        }
        Ok(values)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(&self.full_key(key))?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(full_key: &str, bytes: &[u8]) -> Result<T> {
    match bytes.split_first() {
        Some((&CODABLE_FORMAT_VERSION, json)) => Ok(serde_json::from_slice(json)?),
        Some((&version, _)) => Err(StorageError::unsupported_version(full_key, version).into()),
        None => Err(StorageError::corrupted(full_key, "empty record").into()),
    }
}

/// Key prefix of subscription records.
pub const SUBSCRIPTION_PREFIX: &str = "push.subscription.";

/// Active subscriptions keyed by topic.
#[derive(Clone)]
pub struct SubscriptionStore {
    inner: CodableStore<PushSubscription>,
}

impl SubscriptionStore {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            inner: CodableStore::new(store, SUBSCRIPTION_PREFIX),
        }
    }

    pub fn set(&self, subscription: &PushSubscription, topic: &Topic) -> Result<()> {
        self.inner.set(subscription, topic.as_str())
    }

    pub fn get(&self, topic: &Topic) -> Result<Option<PushSubscription>> {
        self.inner.get(topic.as_str())
    }

    pub fn get_all(&self) -> Result<Vec<PushSubscription>> {
        self.inner.get_all()
    }

    pub fn delete(&self, topic: &Topic) -> Result<()> {
        self.inner.delete(topic.as_str())
    }
}
