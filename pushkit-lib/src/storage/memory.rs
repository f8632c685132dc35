//! In-memory shared store.
//!
//! Intended for tests and for hosts that keep the main process and the
//! extension in one address space. `reader()` hands out a read-only view over
//! the same records, which mirrors how the extension sees the group
//! container.
//!
//! # Thread Safety
//!
//! Records live behind an `RwLock`. Lock poisoning is reported as an error
//! rather than a panic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::traits::{SharedStore, StorageError, StorageErrorCode, StorageResult};

/// In-memory implementation of [`SharedStore`].
#[derive(Clone)]
pub struct InMemoryStore {
    namespace: String,
    records: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    read_only: bool,
}

fn lock_error(context: &str) -> StorageError {
    StorageError::new(
        StorageErrorCode::Internal,
        format!("InMemoryStore: lock poisoned during {}", context),
    )
}

impl InMemoryStore {
    /// Create an empty store bound to `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: Arc::new(RwLock::new(HashMap::new())),
            read_only: false,
        }
    }

    /// A read-only handle over the same records.
    pub fn reader(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            records: Arc::clone(&self.records),
            read_only: true,
        }
    }

    /// Number of stored records. Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store is empty. Returns true if the lock is poisoned.
    pub fn is_empty(&self) -> bool {
        self.records.read().map(|r| r.is_empty()).unwrap_or(true)
    }
}

impl SharedStore for InMemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let records = self.records.read().map_err(|_| lock_error("read"))?;
        Ok(records.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::read_only(&self.namespace));
        }
        let mut records = self.records.write().map_err(|_| lock_error("write"))?;
        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::read_only(&self.namespace));
        }
        let mut records = self.records.write().map_err(|_| lock_error("delete"))?;
        records.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let records = self.records.read().map_err(|_| lock_error("keys"))?;
        Ok(records
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
