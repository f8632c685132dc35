//! Paired in-memory relay.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use pushkit_lib::codec::EnvelopeType;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::rpc::RpcMessage;
use pushkit_lib::{RpcId, RpcRequest, RpcResponse, Topic};
use serde::Serialize;

use crate::protocol::ProtocolMethod;
use crate::relay::{InboundMessage, RelayClient, RelayError, RelayResult};
use crate::types::PushError;

/// Relay operations that can be switched to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayOperation {
    Subscribe,
    Unsubscribe,
    Request,
    Respond,
    RespondError,
}

/// One publish as it went over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: Topic,
    /// Base64 envelope.
    pub message: String,
    pub tag: u32,
}

type Queue = Arc<Mutex<VecDeque<PublishedMessage>>>;

/// One end of an in-memory relay connection.
///
/// Publishes go to the peer's inbox. [`next_inbound`](Self::next_inbound)
/// drops messages for topics this end is not subscribed to, like the real
/// relay does.
pub struct MemoryRelay {
    kms: KeyManagementService,
    subscriptions: RwLock<HashSet<Topic>>,
    published: RwLock<Vec<PublishedMessage>>,
    failing: RwLock<HashSet<RelayOperation>>,
    outbox: Queue,
    inbox: Queue,
}

impl MemoryRelay {
    /// Create two connected ends using the given key stores.
    pub fn pair(a: KeyManagementService, b: KeyManagementService) -> (Self, Self) {
        let a_to_b: Queue = Arc::default();
        let b_to_a: Queue = Arc::default();
        (
            Self::new(a, Arc::clone(&a_to_b), Arc::clone(&b_to_a)),
            Self::new(b, b_to_a, a_to_b),
        )
    }

    fn new(kms: KeyManagementService, outbox: Queue, inbox: Queue) -> Self {
        Self {
            kms,
            subscriptions: RwLock::default(),
            published: RwLock::default(),
            failing: RwLock::default(),
            outbox,
            inbox,
        }
    }

    /// Make `operation` fail until [`recover`](Self::recover) is called.
    pub fn fail(&self, operation: RelayOperation) {
        self.failing.write().unwrap().insert(operation);
    }

    pub fn recover(&self, operation: RelayOperation) {
        self.failing.write().unwrap().remove(&operation);
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.subscriptions.read().unwrap().contains(topic)
    }

    pub fn subscribed_topics(&self) -> Vec<Topic> {
        self.subscriptions.read().unwrap().iter().cloned().collect()
    }

    /// Everything this end published, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().unwrap().clone()
    }

    /// Number of undelivered messages waiting for this end.
    pub fn pending_inbound(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    /// Deliver a message again, as an at-least-once relay may.
    pub fn redeliver(&self, message: PublishedMessage) {
        self.outbox.lock().unwrap().push_back(message);
    }

    /// Next decodable message on a subscribed topic.
    pub fn next_inbound(&self) -> Option<InboundMessage> {
        loop {
            let published = self.inbox.lock().unwrap().pop_front()?;
            if !self.is_subscribed(&published.topic) {
                continue;
            }
            let Ok((plaintext, sender_public_key)) =
                self.kms.decrypt(&published.topic, &published.message)
            else {
                continue;
            };
            let Ok(message) = serde_json::from_slice::<RpcMessage>(&plaintext) else {
                continue;
            };
            return Some(InboundMessage {
                topic: published.topic,
                message,
                sender_public_key,
            });
        }
    }

    fn check(&self, operation: RelayOperation) -> RelayResult<()> {
        if self.failing.read().unwrap().contains(&operation) {
            return Err(RelayError(format!("{:?} failed", operation)));
        }
        Ok(())
    }

    fn publish(
        &self,
        topic: &Topic,
        payload: &impl Serialize,
        tag: u32,
        envelope_type: EnvelopeType,
    ) -> RelayResult<()> {
        let plaintext = serde_json::to_vec(payload).map_err(|e| RelayError(e.to_string()))?;
        let message = self
            .kms
            .encrypt(topic, &plaintext, envelope_type)
            .map_err(|e| RelayError(e.to_string()))?;
        let published = PublishedMessage {
            topic: topic.clone(),
            message,
            tag,
        };
        self.published.write().unwrap().push(published.clone());
        self.outbox.lock().unwrap().push_back(published);
        Ok(())
    }
}

#[async_trait]
impl RelayClient for MemoryRelay {
    async fn subscribe(&self, topic: &Topic) -> RelayResult<()> {
        self.check(RelayOperation::Subscribe)?;
        self.subscriptions.write().unwrap().insert(topic.clone());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &Topic) -> RelayResult<()> {
        self.check(RelayOperation::Unsubscribe)?;
        self.subscriptions.write().unwrap().remove(topic);
        Ok(())
    }

    async fn request(
        &self,
        topic: &Topic,
        request: &RpcRequest,
        method: &ProtocolMethod,
    ) -> RelayResult<()> {
        self.check(RelayOperation::Request)?;
        self.publish(topic, request, method.request_tag, EnvelopeType::Type0)
    }

    async fn respond(
        &self,
        topic: &Topic,
        response: &RpcResponse,
        method: &ProtocolMethod,
        envelope_type: EnvelopeType,
    ) -> RelayResult<()> {
        self.check(RelayOperation::Respond)?;
        self.publish(topic, response, method.response_tag, envelope_type)
    }

    async fn respond_error(
        &self,
        topic: &Topic,
        request_id: RpcId,
        method: &ProtocolMethod,
        reason: &PushError,
    ) -> RelayResult<()> {
        self.check(RelayOperation::RespondError)?;
        let response = RpcResponse::error(request_id, reason.into());
        self.publish(topic, &response, method.response_tag, EnvelopeType::Type0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PUSH_MESSAGE;
    use crate::test_utils::pair_kms;
    use pushkit_lib::storage::InMemoryStore;

    fn kms() -> KeyManagementService {
        KeyManagementService::new(Arc::new(InMemoryStore::new("group.test")))
    }

    #[tokio::test]
    async fn test_delivers_only_subscribed_topics() {
        let (a_kms, b_kms) = (kms(), kms());
        let topic = pair_kms(&a_kms, &b_kms).unwrap();
        let (a, b) = MemoryRelay::pair(a_kms, b_kms);
        let request = RpcRequest::new(PUSH_MESSAGE.method, serde_json::json!({})).unwrap();

        a.request(&topic, &request, &PUSH_MESSAGE).await.unwrap();
        assert!(b.next_inbound().is_none());

        b.subscribe(&topic).await.unwrap();
        a.request(&topic, &request, &PUSH_MESSAGE).await.unwrap();
        let inbound = b.next_inbound().unwrap();
        assert_eq!(inbound.message, RpcMessage::Request(request));
        assert_eq!(a.published().len(), 2);
        assert_eq!(a.published()[0].tag, 4002);
    }

    #[tokio::test]
    async fn test_failure_switch() {
        let (a, _b) = MemoryRelay::pair(kms(), kms());
        let topic = Topic::generate();
        a.fail(RelayOperation::Subscribe);
        assert!(a.subscribe(&topic).await.is_err());
        a.recover(RelayOperation::Subscribe);
        assert!(a.subscribe(&topic).await.is_ok());
    }
}
