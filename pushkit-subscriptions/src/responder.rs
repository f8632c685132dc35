//! Wallet side of the subscription handshake.
//!
//! ```text
//! ProposalReceived -> KeysAgreed -> ResponseSent -> Active -> Deleted
//!        \
//!         -> Rejected
//! ```
//!
//! `respond` commits exactly once: each request id is claimed by one caller,
//! and the subscription record is written only after the signed acceptance
//! went out. A failure before the ledger records the response rolls back the
//! subscription record, the key entries and the relay subscription. The
//! ephemeral private key is deleted on every path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pushkit_lib::codec::EnvelopeType;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::{
    Account, AgreementKeys, AgreementPublicKey, RpcId, RpcRequest, RpcResponse, Topic,
};
use tracing::{debug, info, warn};

use crate::identity::IdentitySigner;
use crate::protocol::PUSH_REQUEST;
use crate::relay::RelayClient;
use crate::rpc_history::{RpcHistory, RpcRecord};
use crate::store::SubscriptionStore;
use crate::types::{
    AcceptSubscriptionPayload, PushError, PushRequestParams, PushSubscription,
    RelayProtocolOptions,
};
use crate::{Result, SubscriptionError};

/// Handshake progress for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    ProposalReceived,
    KeysAgreed,
    ResponseSent,
    Active,
    Rejected,
    Deleted,
}

struct Tracked {
    state: HandshakeState,
    subscription_topic: Option<Topic>,
}

/// Answers `wc_pushRequest` proposals recorded in the ledger.
pub struct PushRequestResponder {
    keyserver_url: String,
    relay: Arc<dyn RelayClient>,
    kms: KeyManagementService,
    signer: Arc<dyn IdentitySigner>,
    history: Arc<RpcHistory>,
    subscriptions: SubscriptionStore,
    tracked: Mutex<HashMap<RpcId, Tracked>>,
}

impl PushRequestResponder {
    pub fn new(
        keyserver_url: impl Into<String>,
        relay: Arc<dyn RelayClient>,
        kms: KeyManagementService,
        signer: Arc<dyn IdentitySigner>,
        history: Arc<RpcHistory>,
        subscriptions: SubscriptionStore,
    ) -> Self {
        Self {
            keyserver_url: keyserver_url.into(),
            relay,
            kms,
            signer,
            history,
            subscriptions,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Accept the proposal `request_id` and return the new subscription.
    ///
    /// A second call for the same id fails with
    /// [`SubscriptionError::ResponseInProgress`] while the first is running
    /// and with [`SubscriptionError::AlreadyResponded`] once it has succeeded.
    #[tracing::instrument(skip(self))]
    pub async fn respond(&self, request_id: RpcId) -> Result<PushSubscription> {
        debug!("approving push proposal");

        self.claim(request_id)?;
        let result = self.accept(request_id).await;
        if result.is_err() {
            self.untrack(request_id);
        }
        result
    }

    /// Reject the proposal `request_id` on the topic it arrived on.
    #[tracing::instrument(skip(self))]
    pub async fn respond_error(&self, request_id: RpcId) -> Result<()> {
        debug!("rejecting push proposal");

        self.claim(request_id)?;
        let result = self.reject(request_id).await;
        if result.is_err() {
            self.untrack(request_id);
        }
        result
    }

    /// Current handshake state, or `None` for an unknown request id.
    pub fn state(&self, request_id: RpcId) -> Result<Option<HandshakeState>> {
        let tracked = {
            let tracked = self.lock_tracked()?;
            tracked
                .get(&request_id)
                .map(|t| (t.state, t.subscription_topic.clone()))
        };

        if let Some((state, topic)) = tracked {
            if let (HandshakeState::Active, Some(topic)) = (state, topic) {
                if self.subscriptions.get(&topic)?.is_none() {
                    return Ok(Some(HandshakeState::Deleted));
                }
            }
            return Ok(Some(state));
        }

        Ok(self.history.get(request_id)?.map(|record| match record.response {
            None => HandshakeState::ProposalReceived,
            Some(response) if response.is_error() => HandshakeState::Rejected,
            Some(_) => HandshakeState::Active,
        }))
    }

    async fn accept(&self, request_id: RpcId) -> Result<PushSubscription> {
        let record = self.get_record(request_id)?;
        if record.response.is_some() {
            return Err(SubscriptionError::AlreadyResponded(request_id));
        }
        let params = request_params(&record.request)?;
        let peer_public_key = AgreementPublicKey::from_hex(&params.public_key)
            .map_err(|e| SubscriptionError::InvalidPeerKey(e.to_string()))?;
        let response_topic = Topic::response_topic(&peer_public_key);

        let keys = self.kms.generate_agreement_keys(&peer_public_key)?;
        let subscription_topic = keys.derived_topic();
        debug_assert_ne!(response_topic, subscription_topic);
        self.track(request_id, HandshakeState::KeysAgreed, None);

        let outcome = match self
            .send_acceptance(
                request_id,
                &params,
                &keys,
                &response_topic,
                &subscription_topic,
            )
            .await
        {
            Ok(response) => self.commit(request_id, params, &subscription_topic, response),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            warn!(error = %e, "push proposal response failed, rolling back");
            self.roll_back(&response_topic, &subscription_topic).await;
        }
        if let Err(e) = self.kms.delete_private_key(&keys.public_key) {
            warn!(error = %e, "failed to delete ephemeral private key");
        }
        outcome
    }

    async fn reject(&self, request_id: RpcId) -> Result<()> {
        let record = self.get_record(request_id)?;
        if record.response.is_some() {
            return Err(SubscriptionError::AlreadyResponded(request_id));
        }

        let reason = PushError::Rejected;
        self.relay
            .respond_error(&record.topic, request_id, &PUSH_REQUEST, &reason)
            .await?;
        self.history
            .resolve(RpcResponse::error(request_id, (&reason).into()))?;
        self.track(request_id, HandshakeState::Rejected, None);
        Ok(())
    }

    async fn send_acceptance(
        &self,
        request_id: RpcId,
        params: &PushRequestParams,
        keys: &AgreementKeys,
        response_topic: &Topic,
        subscription_topic: &Topic,
    ) -> Result<RpcResponse> {
        self.kms.set_agreement_secret(keys, response_topic)?;
        self.kms.set_agreement_secret(keys, subscription_topic)?;

        debug!(topic = %subscription_topic.short(), "subscribing to push topic");
        self.relay.subscribe(subscription_topic).await?;

        let response =
            self.create_jwt_response(request_id, &params.account, &params.metadata.url)?;

        debug!(topic = %response_topic.short(), "responding on response topic");
        self.relay
            .respond(
                response_topic,
                &response,
                &PUSH_REQUEST,
                EnvelopeType::Type1 {
                    sender_public_key: keys.public_key,
                },
            )
            .await?;
        self.track(request_id, HandshakeState::ResponseSent, None);
        Ok(response)
    }

    fn commit(
        &self,
        request_id: RpcId,
        params: PushRequestParams,
        subscription_topic: &Topic,
        response: RpcResponse,
    ) -> Result<PushSubscription> {
        let subscription = PushSubscription {
            topic: subscription_topic.clone(),
            account: params.account,
            relay: RelayProtocolOptions::default(),
            metadata: params.metadata,
        };
        self.subscriptions.set(&subscription, subscription_topic)?;

        // The ledger entry is the commit point; without it the record goes.
        if let Err(e) = self.history.resolve(response) {
            if let Err(delete_error) = self.subscriptions.delete(subscription_topic) {
                warn!(error = %delete_error, "failed to remove uncommitted subscription");
            }
            return Err(e);
        }
        self.track(
            request_id,
            HandshakeState::Active,
            Some(subscription_topic.clone()),
        );
        info!(topic = %subscription_topic.short(), "push subscription active");
        Ok(subscription)
    }

    async fn roll_back(&self, response_topic: &Topic, subscription_topic: &Topic) {
        for topic in [response_topic, subscription_topic] {
            if let Err(e) = self.kms.delete_agreement_secret(topic) {
                warn!(error = %e, topic = %topic.short(), "failed to remove agreement secret");
            }
        }
        if let Err(e) = self.relay.unsubscribe(subscription_topic).await {
            debug!(error = %e, "unsubscribe during rollback failed");
        }
    }

    fn create_jwt_response(
        &self,
        request_id: RpcId,
        subscription_account: &Account,
        dapp_url: &str,
    ) -> Result<RpcResponse> {
        let payload = AcceptSubscriptionPayload {
            keyserver: self.keyserver_url.clone(),
            subscription_account: subscription_account.clone(),
            dapp_url: dapp_url.to_string(),
        };
        let wrapper = self
            .signer
            .sign_and_create_wrapper(&payload, subscription_account)?;
        Ok(RpcResponse::result(request_id, wrapper)?)
    }

    fn get_record(&self, request_id: RpcId) -> Result<RpcRecord> {
        self.history
            .get(request_id)?
            .ok_or(SubscriptionError::RecordNotFound(request_id))
    }

    fn lock_tracked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<RpcId, Tracked>>> {
        self.tracked
            .lock()
            .map_err(|_| SubscriptionError::Storage("responder state lock poisoned".into()))
    }

    /// Reserve `request_id` for one caller. Finished handshakes report
    /// `AlreadyResponded`, running ones `ResponseInProgress`.
    fn claim(&self, request_id: RpcId) -> Result<()> {
        let mut tracked = self.lock_tracked()?;
        match tracked.get(&request_id).map(|t| t.state) {
            Some(HandshakeState::Active | HandshakeState::Rejected | HandshakeState::Deleted) => {
                Err(SubscriptionError::AlreadyResponded(request_id))
            }
            Some(_) => Err(SubscriptionError::ResponseInProgress(request_id)),
            None => {
                tracked.insert(
                    request_id,
                    Tracked {
                        state: HandshakeState::ProposalReceived,
                        subscription_topic: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn track(&self, request_id: RpcId, state: HandshakeState, topic: Option<Topic>) {
        if let Ok(mut tracked) = self.lock_tracked() {
            tracked.insert(
                request_id,
                Tracked {
                    state,
                    subscription_topic: topic,
                },
            );
        }
    }

    fn untrack(&self, request_id: RpcId) {
        if let Ok(mut tracked) = self.lock_tracked() {
            tracked.remove(&request_id);
        }
    }
}

/// Decode and validate the params of a `wc_pushRequest`.
pub(crate) fn request_params(request: &RpcRequest) -> Result<PushRequestParams> {
    request
        .params_as::<PushRequestParams>()
        .ok_or_else(|| SubscriptionError::MalformedParams("missing params".into()))?
        .map_err(|e| SubscriptionError::MalformedParams(e.to_string()))
}
