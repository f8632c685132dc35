//! Relay transport seam.
//!
//! The relay is an encrypted publish/subscribe network with at-least-once,
//! unordered delivery. Implementations seal payloads with the topic key from
//! the KMS and tag every publish with the method's request or response tag.
//! Delivery of inbound messages is the host's business; it hands decoded
//! messages to the clients as [`InboundMessage`]s.

use async_trait::async_trait;
use pushkit_lib::codec::EnvelopeType;
use pushkit_lib::rpc::RpcMessage;
use pushkit_lib::{AgreementPublicKey, RpcId, RpcRequest, RpcResponse, Topic};

use crate::protocol::ProtocolMethod;
use crate::types::PushError;

/// Opaque relay failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("relay error: {0}")]
pub struct RelayError(pub String);

pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Operations the push protocol needs from the relay.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn subscribe(&self, topic: &Topic) -> RelayResult<()>;

    async fn unsubscribe(&self, topic: &Topic) -> RelayResult<()>;

    /// Publish a request, type 0 envelope.
    async fn request(
        &self,
        topic: &Topic,
        request: &RpcRequest,
        method: &ProtocolMethod,
    ) -> RelayResult<()>;

    async fn respond(
        &self,
        topic: &Topic,
        response: &RpcResponse,
        method: &ProtocolMethod,
        envelope_type: EnvelopeType,
    ) -> RelayResult<()>;

    /// Publish a structured error response for `request_id`.
    async fn respond_error(
        &self,
        topic: &Topic,
        request_id: RpcId,
        method: &ProtocolMethod,
        reason: &PushError,
    ) -> RelayResult<()>;
}

/// A decrypted inbound relay message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: Topic,
    pub message: RpcMessage,
    /// Present when the message arrived in a type 1 envelope.
    pub sender_public_key: Option<AgreementPublicKey>,
}
