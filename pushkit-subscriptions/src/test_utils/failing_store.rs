//! Store that refuses writes under one key prefix.

use pushkit_lib::storage::{SharedStore, StorageError, StorageErrorCode, StorageResult};

/// Wraps a store and fails every write whose key starts with `prefix`.
/// Reads, deletes and other writes pass through.
pub struct FailingStore<S> {
    inner: S,
    prefix: String,
}

impl<S: SharedStore> FailingStore<S> {
    pub fn new(inner: S, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl<S: SharedStore> SharedStore for FailingStore<S> {
    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if key.starts_with(&self.prefix) {
            return Err(StorageError::new(
                StorageErrorCode::Io,
                format!("write refused: {}", key),
            ));
        }
        self.inner.write(key, value)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key)
    }

    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.keys(prefix)
    }
}
