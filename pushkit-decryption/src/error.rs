//! Errors of the decryption pipeline.
//!
//! None of these reach the host: the service renders them into
//! notification content.

use pushkit_lib::{PushkitError, PushkitErrorCode};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// No agreement secret is stored for the topic (unknown or deleted
    /// subscription).
    #[error("no key for topic {0}")]
    KeyNotFound(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("enrichment failed: {0}")]
    Enrichment(String),
}

impl DecryptionError {
    /// Map a KMS failure for `topic`.
    pub(crate) fn from_kms(topic: &str, err: PushkitError) -> Self {
        match err.code() {
            PushkitErrorCode::NotFound => Self::KeyNotFound(topic.to_string()),
            PushkitErrorCode::Crypto | PushkitErrorCode::InvalidPeerKey => {
                Self::DecryptionFailed(err.to_string())
            }
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DecryptionError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DecryptionError>;
