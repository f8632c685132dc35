//! Error types for PushKit operations.
//!
//! This module provides structured error types for the library so callers
//! can tell transport failures (surfaced as-is, retry is theirs) apart from
//! key-material and storage problems.

use std::fmt;

use crate::codec::CodecError;
use crate::keys::AgreementError;
use crate::storage::StorageError;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PushkitErrorCode {
    /// Feature not compiled in
    Unimplemented = 1000,
    /// Transport/network layer error
    Transport = 2000,
    /// Connection failed
    ConnectionFailed = 2001,
    /// Connection timeout
    ConnectionTimeout = 2002,
    /// Remote endpoint returned a non-success status
    HttpStatus = 2003,
    /// Resource not found
    NotFound = 4000,
    /// Invalid request/data
    InvalidData = 5000,
    /// Validation failed
    ValidationFailed = 5001,
    /// Serialization error
    Serialization = 5002,
    /// Peer public key rejected
    InvalidPeerKey = 6000,
    /// Envelope could not be opened or sealed
    Crypto = 6001,
    /// Storage error
    Storage = 7000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for PushKit operations.
#[derive(Debug)]
pub enum PushkitError {
    /// Feature not compiled in.
    Unimplemented(&'static str),

    /// Transport/network layer error.
    Transport(String),

    /// Connection failed.
    ConnectionFailed {
        /// Target endpoint or service
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Connection timeout.
    ConnectionTimeout {
        /// Operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Remote endpoint answered with a non-2xx status.
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Resource not found (key, topic, subscription, etc.).
    NotFound {
        /// Type of resource (e.g., "private key", "agreement secret")
        resource_type: String,
        /// Resource identifier
        identifier: String,
    },

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Validation failed.
    ValidationFailed(String),

    /// Serialization/deserialization error.
    Serialization(String),

    /// The peer's public key is malformed or produces a degenerate secret.
    InvalidPeerKey(String),

    /// Envelope sealing or opening failed.
    Crypto(String),

    /// Storage operation failed.
    Storage(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl PushkitError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> PushkitErrorCode {
        match self {
            Self::Unimplemented(_) => PushkitErrorCode::Unimplemented,
            Self::Transport(_) => PushkitErrorCode::Transport,
            Self::ConnectionFailed { .. } => PushkitErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => PushkitErrorCode::ConnectionTimeout,
            Self::HttpStatus { .. } => PushkitErrorCode::HttpStatus,
            Self::NotFound { .. } => PushkitErrorCode::NotFound,
            Self::InvalidData { .. } => PushkitErrorCode::InvalidData,
            Self::ValidationFailed(_) => PushkitErrorCode::ValidationFailed,
            Self::Serialization(_) => PushkitErrorCode::Serialization,
            Self::InvalidPeerKey(_) => PushkitErrorCode::InvalidPeerKey,
            Self::Crypto(_) => PushkitErrorCode::Crypto,
            Self::Storage(_) => PushkitErrorCode::Storage,
            Self::Internal(_) => PushkitErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_)
            | Self::ConnectionFailed { .. }
            | Self::ConnectionTimeout { .. }
            | Self::Storage(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Create a transport error from any error type.
    pub fn transport<E: std::error::Error>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Create a not found error.
    pub fn not_found(resource_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PushkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unimplemented(label) => write!(f, "{} is not compiled in", label),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::ConnectionFailed { target, reason } => {
                write!(f, "connection to {} failed: {}", target, reason)
            }
            Self::ConnectionTimeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "{} timed out after {}ms", operation, timeout_ms)
            }
            Self::HttpStatus { status, body } => {
                if body.is_empty() {
                    write!(f, "request failed with status {}", status)
                } else {
                    write!(f, "request failed with status {}: {}", status, body)
                }
            }
            Self::NotFound {
                resource_type,
                identifier,
            } => {
                write!(f, "{} not found: {}", resource_type, identifier)
            }
            Self::InvalidData { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::InvalidPeerKey(msg) => write!(f, "invalid peer key: {}", msg),
            Self::Crypto(msg) => write!(f, "crypto error: {}", msg),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for PushkitError {}

impl From<serde_json::Error> for PushkitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PushkitError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StorageError> for PushkitError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<CodecError> for PushkitError {
    fn from(err: CodecError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<AgreementError> for PushkitError {
    fn from(err: AgreementError) -> Self {
        match err {
            AgreementError::KeyDerivation(msg) => Self::Internal(msg),
            other => Self::InvalidPeerKey(other.to_string()),
        }
    }
}
