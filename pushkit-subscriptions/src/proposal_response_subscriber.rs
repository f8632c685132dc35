//! Dapp side handling of the wallet's answer to a proposal.

use std::sync::Arc;

use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::rpc::RpcOutcome;
use pushkit_lib::{AgreementPublicKey, RpcResponse, Topic};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{PushResponseEvent, PushSubscriptionResult, EVENT_CHANNEL_CAPACITY};
use crate::protocol::PUSH_REQUEST;
use crate::relay::RelayClient;
use crate::responder::request_params;
use crate::rpc_history::RpcHistory;
use crate::store::SubscriptionStore;
use crate::types::{
    PushError, PushRequestParams, PushSubscription, RelayProtocolOptions, SubscriptionAuthWrapper,
};
use crate::{Result, SubscriptionError};

/// Completes or abandons a proposal once the wallet answered.
pub struct ProposalResponseSubscriber {
    relay: Arc<dyn RelayClient>,
    kms: KeyManagementService,
    history: Arc<RpcHistory>,
    subscriptions: SubscriptionStore,
    events: broadcast::Sender<PushResponseEvent>,
}

impl ProposalResponseSubscriber {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        kms: KeyManagementService,
        history: Arc<RpcHistory>,
        subscriptions: SubscriptionStore,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            relay,
            kms,
            history,
            subscriptions,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushResponseEvent> {
        self.events.subscribe()
    }

    /// Handle a response to one of our `wc_pushRequest`s.
    ///
    /// `sender_public_key` is the wallet key carried by the type 1 envelope.
    /// Responses to unknown or already answered requests are ignored.
    /// Returns whether an event was published.
    pub async fn handle(
        &self,
        response: RpcResponse,
        sender_public_key: Option<AgreementPublicKey>,
    ) -> Result<bool> {
        let id = response.id;
        let Some(record) = self.history.get(id)? else {
            debug!(%id, "ignoring response to unknown request");
            return Ok(false);
        };
        if record.response.is_some() {
            debug!(%id, "ignoring redelivered response");
            return Ok(false);
        }
        if record.request.method != PUSH_REQUEST.method {
            return Ok(false);
        }

        let params = request_params(&record.request)?;
        let self_public_key = AgreementPublicKey::from_hex(&params.public_key)
            .map_err(|e| SubscriptionError::InvalidPeerKey(e.to_string()))?;
        let response_topic = Topic::response_topic(&self_public_key);
        self.history.resolve(response.clone())?;

        let result = match &response.outcome {
            RpcOutcome::Error(error) => {
                let reason = PushError::from(error.clone());
                info!(%id, %reason, "push proposal declined");
                Err(reason)
            }
            RpcOutcome::Result(_) => {
                match self
                    .complete(&response, params, &self_public_key, sender_public_key)
                    .await
                {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        self.finish(&response_topic, &self_public_key).await;
                        return Err(e);
                    }
                }
            }
        };

        self.finish(&response_topic, &self_public_key).await;
        let _ = self.events.send(PushResponseEvent { id, result });
        Ok(true)
    }

    async fn complete(
        &self,
        response: &RpcResponse,
        params: PushRequestParams,
        self_public_key: &AgreementPublicKey,
        sender_public_key: Option<AgreementPublicKey>,
    ) -> Result<PushSubscriptionResult> {
        let wrapper: SubscriptionAuthWrapper = response
            .result_as()
            .ok_or_else(|| SubscriptionError::MalformedParams("missing result".into()))?
            .map_err(|e| SubscriptionError::MalformedParams(e.to_string()))?;
        let wallet_public_key = sender_public_key.ok_or_else(|| {
            SubscriptionError::InvalidPeerKey("response carried no sender public key".into())
        })?;

        let keys = self
            .kms
            .perform_key_agreement(self_public_key, &wallet_public_key)?;
        let subscription_topic = keys.derived_topic();
        self.kms.set_agreement_secret(&keys, &subscription_topic)?;

        let subscription = PushSubscription {
            topic: subscription_topic.clone(),
            account: params.account,
            relay: RelayProtocolOptions::default(),
            metadata: params.metadata,
        };
        let stored = match self.relay.subscribe(&subscription_topic).await {
            Ok(()) => self.subscriptions.set(&subscription, &subscription_topic),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!(error = %e, "push subscription failed, rolling back");
            self.roll_back(&subscription_topic).await;
            return Err(e);
        }
        info!(topic = %subscription_topic.short(), "push subscription established");

        Ok(PushSubscriptionResult {
            subscription,
            subscription_auth: wrapper.subscription_auth,
        })
    }

    async fn roll_back(&self, subscription_topic: &Topic) {
        if let Err(e) = self.kms.delete_agreement_secret(subscription_topic) {
            warn!(error = %e, "failed to remove agreement secret");
        }
        if let Err(e) = self.relay.unsubscribe(subscription_topic).await {
            debug!(error = %e, "unsubscribe during rollback failed");
        }
    }

    /// Drop the proposal's response topic and key pair.
    async fn finish(&self, response_topic: &Topic, self_public_key: &AgreementPublicKey) {
        if let Err(e) = self.relay.unsubscribe(response_topic).await {
            debug!(error = %e, "failed to unsubscribe response topic");
        }
        if let Err(e) = self
            .kms
            .delete_public_key(response_topic)
            .and_then(|_| self.kms.delete_private_key(self_public_key))
        {
            warn!(error = %e, "failed to remove proposal keys");
        }
    }
}
