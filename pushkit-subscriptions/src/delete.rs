//! Subscription deletion, from either side.
//!
//! Deleting removes the subscription record and the topic key from the
//! shared store and unsubscribes the topic. After that the extension can no
//! longer open messages on the topic.

use std::sync::Arc;

use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::{RpcRequest, Topic};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::PushDeleteEvent;
use crate::protocol::PUSH_DELETE;
use crate::relay::RelayClient;
use crate::rpc_history::RpcHistory;
use crate::store::SubscriptionStore;
use crate::types::PushDeleteParams;
use crate::{Result, SubscriptionError};

/// Shared local cleanup of a deleted topic.
#[derive(Clone)]
struct TopicCleanup {
    relay: Arc<dyn RelayClient>,
    kms: KeyManagementService,
    subscriptions: SubscriptionStore,
    events: broadcast::Sender<PushDeleteEvent>,
}

impl TopicCleanup {
    async fn run(&self, topic: &Topic) -> Result<()> {
        self.subscriptions.delete(topic)?;
        self.kms.delete_agreement_secret(topic)?;
        if let Err(e) = self.relay.unsubscribe(topic).await {
            warn!(error = %e, topic = %topic.short(), "failed to unsubscribe deleted topic");
        }
        let _ = self.events.send(PushDeleteEvent {
            topic: topic.clone(),
        });
        Ok(())
    }
}

/// Deletes a subscription on our side and tells the counterparty.
pub struct DeletePushSubscriptionService {
    cleanup: TopicCleanup,
    history: Arc<RpcHistory>,
}

impl DeletePushSubscriptionService {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        kms: KeyManagementService,
        history: Arc<RpcHistory>,
        subscriptions: SubscriptionStore,
        events: broadcast::Sender<PushDeleteEvent>,
    ) -> Self {
        Self {
            cleanup: TopicCleanup {
                relay,
                kms,
                subscriptions,
                events,
            },
            history,
        }
    }

    /// Send `wc_pushDelete` on `topic`, then remove it locally.
    ///
    /// Local removal happens even when the send fails; the send error is
    /// returned afterwards.
    #[tracing::instrument(skip(self), fields(topic = %topic.short()))]
    pub async fn delete(&self, topic: &Topic) -> Result<()> {
        if self.cleanup.subscriptions.get(topic)?.is_none() {
            return Err(SubscriptionError::NoSubscriptionForTopic(topic.clone()));
        }

        let request = RpcRequest::new(PUSH_DELETE.method, PushDeleteParams::default())?;
        self.history.set(topic.clone(), request.clone())?;
        let sent = self
            .cleanup
            .relay
            .request(topic, &request, &PUSH_DELETE)
            .await;

        self.cleanup.run(topic).await?;
        sent?;
        info!("push subscription deleted");
        Ok(())
    }
}

/// Handles the counterparty's `wc_pushDelete`.
pub struct DeletePushSubscriptionSubscriber {
    cleanup: TopicCleanup,
    history: Arc<RpcHistory>,
}

impl DeletePushSubscriptionSubscriber {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        kms: KeyManagementService,
        history: Arc<RpcHistory>,
        subscriptions: SubscriptionStore,
        events: broadcast::Sender<PushDeleteEvent>,
    ) -> Self {
        Self {
            cleanup: TopicCleanup {
                relay,
                kms,
                subscriptions,
                events,
            },
            history,
        }
    }

    /// Returns whether the topic was removed by this call.
    pub async fn handle(&self, topic: Topic, request: RpcRequest) -> Result<bool> {
        let id = request.id;
        match self.history.set(topic.clone(), request) {
            Ok(()) => {}
            Err(SubscriptionError::DuplicateRequest(_)) => {
                debug!(%id, "ignoring redelivered delete");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        if self.cleanup.subscriptions.get(&topic)?.is_none() {
            debug!(topic = %topic.short(), "delete for unknown subscription");
        }
        self.cleanup.run(&topic).await?;
        info!(topic = %topic.short(), "push subscription deleted by peer");
        Ok(true)
    }
}
