//! `wc_pushMessage` on active subscription topics.

use std::sync::Arc;

use chrono::Utc;
use pushkit_lib::codec::EnvelopeType;
use pushkit_lib::{RpcId, RpcRequest, RpcResponse, Topic};
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::{PushMessageEvent, EVENT_CHANNEL_CAPACITY};
use crate::protocol::PUSH_MESSAGE;
use crate::relay::RelayClient;
use crate::rpc_history::RpcHistory;
use crate::store::SubscriptionStore;
use crate::types::NotifyMessage;
use crate::{Result, SubscriptionError};

/// Dapp side: publishes notifications.
pub struct PushMessageSender {
    relay: Arc<dyn RelayClient>,
    history: Arc<RpcHistory>,
    subscriptions: SubscriptionStore,
}

impl PushMessageSender {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        history: Arc<RpcHistory>,
        subscriptions: SubscriptionStore,
    ) -> Self {
        Self {
            relay,
            history,
            subscriptions,
        }
    }

    /// Send `message` on the subscription `topic`.
    #[tracing::instrument(skip(self, message), fields(topic = %topic.short()))]
    pub async fn request(&self, topic: &Topic, message: &NotifyMessage) -> Result<RpcId> {
        if self.subscriptions.get(topic)?.is_none() {
            return Err(SubscriptionError::NoSubscriptionForTopic(topic.clone()));
        }

        let request = RpcRequest::new(PUSH_MESSAGE.method, message)?;
        let id = request.id;
        self.history.set(topic.clone(), request.clone())?;
        self.relay.request(topic, &request, &PUSH_MESSAGE).await?;
        debug!(%id, "push message sent");
        Ok(id)
    }
}

/// Wallet side: receives notifications and acknowledges them.
pub struct PushMessageSubscriber {
    relay: Arc<dyn RelayClient>,
    history: Arc<RpcHistory>,
    events: broadcast::Sender<PushMessageEvent>,
}

impl PushMessageSubscriber {
    pub fn new(relay: Arc<dyn RelayClient>, history: Arc<RpcHistory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            relay,
            history,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushMessageEvent> {
        self.events.subscribe()
    }

    /// Handle a `wc_pushMessage` received on `topic`. Redeliveries are
    /// ignored. Returns whether an event was published.
    pub async fn handle(&self, topic: Topic, request: RpcRequest) -> Result<bool> {
        let id = request.id;
        let message: NotifyMessage = request
            .params_as()
            .ok_or_else(|| SubscriptionError::MalformedParams("missing params".into()))?
            .map_err(|e| SubscriptionError::MalformedParams(e.to_string()))?;

        match self.history.set(topic.clone(), request) {
            Ok(()) => {}
            Err(SubscriptionError::DuplicateRequest(_)) => {
                debug!(%id, "ignoring redelivered push message");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let _ = self.events.send(PushMessageEvent {
            id,
            topic: topic.clone(),
            message,
            published_at: Utc::now().timestamp(),
        });

        let ack = RpcResponse::result(id, true)?;
        self.relay
            .respond(&topic, &ack, &PUSH_MESSAGE, EnvelopeType::Type0)
            .await?;
        self.history.resolve(ack)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, pair_kms, MemoryRelay};
    use crate::types::{PushSubscription, RelayProtocolOptions};
    use pushkit_lib::kms::KeyManagementService;
    use pushkit_lib::rpc::RpcMessage;
    use pushkit_lib::storage::InMemoryStore;

    struct Pair {
        sender: PushMessageSender,
        subscriber: PushMessageSubscriber,
        dapp_relay: Arc<MemoryRelay>,
        wallet_relay: Arc<MemoryRelay>,
        topic: Topic,
    }

    async fn pair() -> Pair {
        let dapp_group = InMemoryStore::new("group.dapp");
        let dapp_kms = KeyManagementService::new(Arc::new(dapp_group.clone()));
        let wallet_kms = KeyManagementService::new(Arc::new(InMemoryStore::new("group.wallet")));
        let topic = pair_kms(&dapp_kms, &wallet_kms).unwrap();
        let (dapp_relay, wallet_relay) = MemoryRelay::pair(dapp_kms, wallet_kms);
        let (dapp_relay, wallet_relay) = (Arc::new(dapp_relay), Arc::new(wallet_relay));
        wallet_relay.subscribe(&topic).await.unwrap();
        dapp_relay.subscribe(&topic).await.unwrap();

        let subscriptions = SubscriptionStore::new(Arc::new(dapp_group));
        subscriptions
            .set(
                &PushSubscription {
                    topic: topic.clone(),
                    account: fixtures::account(),
                    relay: RelayProtocolOptions::default(),
                    metadata: fixtures::metadata(),
                },
                &topic,
            )
            .unwrap();

        Pair {
            sender: PushMessageSender::new(
                dapp_relay.clone(),
                Arc::new(RpcHistory::new(Arc::new(InMemoryStore::new("dapp.main")))),
                subscriptions,
            ),
            subscriber: PushMessageSubscriber::new(
                wallet_relay.clone(),
                Arc::new(RpcHistory::new(Arc::new(InMemoryStore::new("wallet.main")))),
            ),
            dapp_relay,
            wallet_relay,
            topic,
        }
    }

    #[tokio::test]
    async fn test_unknown_topic() {
        let p = pair().await;
        let err = p
            .sender
            .request(&Topic::generate(), &NotifyMessage::new("Hi", "Yo"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NoSubscriptionForTopic(_)));
        assert!(p.dapp_relay.published().is_empty());
    }

    #[tokio::test]
    async fn test_message_delivered_once_and_acknowledged() {
        let p = pair().await;
        let mut events = p.subscriber.subscribe();
        let message = NotifyMessage::new("Hi", "Yo").with_url("https://gm.example");

        p.sender.request(&p.topic, &message).await.unwrap();
        assert_eq!(p.dapp_relay.published()[0].tag, 4002);

        let published = p.dapp_relay.published()[0].clone();
        p.dapp_relay.redeliver(published);

        for _ in 0..2 {
            let inbound = p.wallet_relay.next_inbound().unwrap();
            let RpcMessage::Request(request) = inbound.message else {
                panic!("expected request");
            };
            p.subscriber.handle(inbound.topic, request).await.unwrap();
        }

        assert_eq!(events.try_recv().unwrap().message, message);
        assert!(events.try_recv().is_err());

        let acks = p.wallet_relay.published();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].tag, 4003);
        let ack = p.dapp_relay.next_inbound().unwrap();
        assert!(matches!(ack.message, RpcMessage::Response(r) if !r.is_error()));
    }
}
