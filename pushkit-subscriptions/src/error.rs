//! Error types for the subscription protocol.

use pushkit_lib::storage::StorageError;
use pushkit_lib::{PushkitError, PushkitErrorCode, RpcId, Topic};

use crate::relay::RelayError;

/// Errors raised by the handshake, the ledger and the stores.
#[derive(thiserror::Error, Debug)]
pub enum SubscriptionError {
    /// No ledger record for this request id: never received, or the id is
    /// wrong. Nothing was changed.
    #[error("no record for request {0}")]
    RecordNotFound(RpcId),
    #[error("malformed request params: {0}")]
    MalformedParams(String),
    #[error("invalid peer key: {0}")]
    InvalidPeerKey(String),
    #[error("request {0} already has a response")]
    AlreadyResponded(RpcId),
    /// Another call is answering this request right now.
    #[error("request {0} is already being answered")]
    ResponseInProgress(RpcId),
    /// The same request was recorded before; callers treat this as a replay.
    #[error("duplicate request {0}")]
    DuplicateRequest(RpcId),
    #[error("request id {0} is already bound to a different request")]
    RequestIdConflict(RpcId),
    #[error("no subscription for topic {0}")]
    NoSubscriptionForTopic(Topic),
    /// Relay failure, surfaced unchanged. Retry is the caller's decision.
    #[error(transparent)]
    Transport(#[from] RelayError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("key error: {0}")]
    Key(String),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StorageError> for SubscriptionError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SubscriptionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<PushkitError> for SubscriptionError {
    fn from(err: PushkitError) -> Self {
        match err.code() {
            PushkitErrorCode::InvalidPeerKey => Self::InvalidPeerKey(err.to_string()),
            PushkitErrorCode::Storage => Self::Storage(err.to_string()),
            PushkitErrorCode::Serialization => Self::Serialization(err.to_string()),
            _ => Self::Key(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SubscriptionError>;
