//! Core traits for shared durable storage.

use std::fmt;

/// Error codes for shared storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StorageErrorCode {
    /// Key not found
    NotFound = 1000,
    /// Write attempted through a read-only handle
    AccessDenied = 2000,
    /// Stored record has an unknown format version
    UnsupportedVersion = 4000,
    /// Stored record could not be decoded
    Corrupted = 4001,
    /// Underlying I/O failure
    Io = 5000,
    /// Internal error
    Internal = 9999,
}

/// Error type for shared storage operations.
#[derive(Debug)]
pub struct StorageError {
    /// Error code for FFI/mobile integration
    pub code: StorageErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Record key related to error (if applicable)
    pub key: Option<String>,
}

impl StorageError {
    /// Create a new error.
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            key: None,
        }
    }

    /// Create a "not found" error.
    pub fn not_found(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            code: StorageErrorCode::NotFound,
            message: format!("Record not found: {}", key),
            key: Some(key),
        }
    }

    /// Create an "access denied" error for a write through a reader handle.
    pub fn read_only(namespace: &str) -> Self {
        Self::new(
            StorageErrorCode::AccessDenied,
            format!("Namespace '{}' is opened read-only", namespace),
        )
    }

    /// Create an "unsupported version" error.
    pub fn unsupported_version(key: impl Into<String>, version: u8) -> Self {
        let key = key.into();
        Self {
            code: StorageErrorCode::UnsupportedVersion,
            message: format!("Unsupported record format version {}", version),
            key: Some(key),
        }
    }

    /// Create a "corrupted record" error.
    pub fn corrupted(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::Corrupted,
            message: reason.into(),
            key: Some(key.into()),
        }
    }

    /// Check if this error indicates the record wasn't found.
    pub fn is_not_found(&self) -> bool {
        self.code == StorageErrorCode::NotFound
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = &self.key {
            write!(f, "{} (key: {})", self.message, key)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::new(StorageErrorCode::Io, e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Namespaced key-value storage shared between the main process and the
/// notification extension.
///
/// Implementations must guarantee:
/// - a reader never observes a partially written record
/// - reads never block on a concurrent writer
/// - the namespace string maps to the same physical storage in every process
///
/// Operations are synchronous; they are local and fast, and the extension
/// calls them under a hard time budget.
pub trait SharedStore: Send + Sync {
    /// The namespace (application group identifier) this handle is bound to.
    fn namespace(&self) -> &str;

    /// Read a record. Returns `None` when the key is absent.
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write a record, replacing any previous value atomically.
    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Delete a record. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// List all keys that start with `prefix`.
    fn keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Whether this handle refuses writes.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Extension trait for convenience methods.
pub trait SharedStoreExt: SharedStore {
    /// Read a record, returning an error if it is absent.
    fn read_required(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.read(key)?.ok_or_else(|| StorageError::not_found(key))
    }

    /// Check if a record exists.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key)?.is_some())
    }
}

impl<T: SharedStore + ?Sized> SharedStoreExt for T {}
