//! Wallet and dapp facades.
//!
//! A host owns the relay connection. It decrypts inbound messages with its
//! KMS and passes them to `handle_inbound`, which routes by method (for
//! requests) or by the ledger record (for responses).

use std::sync::Arc;

use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::rpc::RpcMessage;
use pushkit_lib::storage::SharedStore;
use pushkit_lib::{Account, AppMetadata, RpcId, RpcResponse, Topic};
use tokio::sync::broadcast;
use tracing::debug;

use crate::delete::{DeletePushSubscriptionService, DeletePushSubscriptionSubscriber};
use crate::events::{
    PushDeleteEvent, PushMessageEvent, PushRequestEvent, PushResponseEvent,
    EVENT_CHANNEL_CAPACITY,
};
use crate::identity::IdentitySigner;
use crate::messages::{PushMessageSender, PushMessageSubscriber};
use crate::proposal_response_subscriber::ProposalResponseSubscriber;
use crate::proposer::PushProposer;
use crate::protocol::{PUSH_DELETE, PUSH_MESSAGE, PUSH_REQUEST};
use crate::relay::{InboundMessage, RelayClient};
use crate::request_subscriber::PushRequestSubscriber;
use crate::responder::{request_params, HandshakeState, PushRequestResponder};
use crate::rpc_history::RpcHistory;
use crate::store::SubscriptionStore;
use crate::types::{NotifyMessage, PushSubscription};
use crate::{Result, SubscriptionError};

/// Stores a push client works on.
///
/// `group` is the shared namespace the notification extension reads;
/// `main` is private to the host process.
#[derive(Clone)]
pub struct ClientStores {
    pub group: Arc<dyn SharedStore>,
    pub main: Arc<dyn SharedStore>,
}

/// Attach a response to its ledger record, ignoring unknown ids and
/// redeliveries.
fn resolve_quietly(history: &RpcHistory, response: RpcResponse) -> Result<()> {
    let id = response.id;
    match history.resolve(response) {
        Ok(_) => Ok(()),
        Err(SubscriptionError::RecordNotFound(_) | SubscriptionError::AlreadyResponded(_)) => {
            debug!(%id, "ignoring uncorrelated response");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Wallet side push client.
pub struct WalletPushClient {
    history: Arc<RpcHistory>,
    subscriptions: SubscriptionStore,
    request_subscriber: PushRequestSubscriber,
    responder: PushRequestResponder,
    message_subscriber: PushMessageSubscriber,
    delete_service: DeletePushSubscriptionService,
    delete_subscriber: DeletePushSubscriptionSubscriber,
    delete_events: broadcast::Sender<PushDeleteEvent>,
}

impl WalletPushClient {
    pub fn new(
        keyserver_url: impl Into<String>,
        relay: Arc<dyn RelayClient>,
        stores: ClientStores,
        signer: Arc<dyn IdentitySigner>,
    ) -> Self {
        let kms = KeyManagementService::new(Arc::clone(&stores.group));
        let history = Arc::new(RpcHistory::new(stores.main));
        let subscriptions = SubscriptionStore::new(stores.group);
        let (delete_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            request_subscriber: PushRequestSubscriber::new(Arc::clone(&history)),
            responder: PushRequestResponder::new(
                keyserver_url,
                Arc::clone(&relay),
                kms.clone(),
                signer,
                Arc::clone(&history),
                subscriptions.clone(),
            ),
            message_subscriber: PushMessageSubscriber::new(Arc::clone(&relay), Arc::clone(&history)),
            delete_service: DeletePushSubscriptionService::new(
                Arc::clone(&relay),
                kms.clone(),
                Arc::clone(&history),
                subscriptions.clone(),
                delete_events.clone(),
            ),
            delete_subscriber: DeletePushSubscriptionSubscriber::new(
                relay,
                kms,
                Arc::clone(&history),
                subscriptions.clone(),
                delete_events.clone(),
            ),
            delete_events,
            history,
            subscriptions,
        }
    }

    /// Accept a received proposal.
    pub async fn approve(&self, request_id: RpcId) -> Result<PushSubscription> {
        self.responder.respond(request_id).await
    }

    /// Decline a received proposal.
    pub async fn reject(&self, request_id: RpcId) -> Result<()> {
        self.responder.respond_error(request_id).await
    }

    pub fn handshake_state(&self, request_id: RpcId) -> Result<Option<HandshakeState>> {
        self.responder.state(request_id)
    }

    pub async fn delete_subscription(&self, topic: &Topic) -> Result<()> {
        self.delete_service.delete(topic).await
    }

    pub fn get_active_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        self.subscriptions.get_all()
    }

    /// Proposals that were received but not answered yet.
    pub fn get_pending_requests(&self) -> Result<Vec<PushRequestEvent>> {
        Ok(self
            .history
            .get_pending()?
            .into_iter()
            .filter(|record| record.request.method == PUSH_REQUEST.method)
            .filter_map(|record| {
                let params = request_params(&record.request).ok()?;
                Some(PushRequestEvent {
                    id: record.id,
                    account: params.account,
                    metadata: params.metadata,
                })
            })
            .collect())
    }

    pub fn subscribe_requests(&self) -> broadcast::Receiver<PushRequestEvent> {
        self.request_subscriber.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<PushMessageEvent> {
        self.message_subscriber.subscribe()
    }

    pub fn subscribe_deletes(&self) -> broadcast::Receiver<PushDeleteEvent> {
        self.delete_events.subscribe()
    }

    /// Route a decrypted inbound message.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        match inbound.message {
            RpcMessage::Request(request) if request.method == PUSH_REQUEST.method => {
                self.request_subscriber.handle(inbound.topic, request)?;
            }
            RpcMessage::Request(request) if request.method == PUSH_MESSAGE.method => {
                self.message_subscriber.handle(inbound.topic, request).await?;
            }
            RpcMessage::Request(request) if request.method == PUSH_DELETE.method => {
                self.delete_subscriber.handle(inbound.topic, request).await?;
            }
            RpcMessage::Request(request) => {
                debug!(method = %request.method, "ignoring unsupported request");
            }
            RpcMessage::Response(response) => resolve_quietly(&self.history, response)?,
        }
        Ok(())
    }
}

/// Dapp side push client.
pub struct DappPushClient {
    history: Arc<RpcHistory>,
    subscriptions: SubscriptionStore,
    proposer: PushProposer,
    response_subscriber: ProposalResponseSubscriber,
    message_sender: PushMessageSender,
    delete_service: DeletePushSubscriptionService,
    delete_subscriber: DeletePushSubscriptionSubscriber,
    delete_events: broadcast::Sender<PushDeleteEvent>,
}

impl DappPushClient {
    pub fn new(metadata: AppMetadata, relay: Arc<dyn RelayClient>, stores: ClientStores) -> Self {
        let kms = KeyManagementService::new(Arc::clone(&stores.group));
        let history = Arc::new(RpcHistory::new(stores.main));
        let subscriptions = SubscriptionStore::new(stores.group);
        let (delete_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            proposer: PushProposer::new(
                metadata,
                Arc::clone(&relay),
                kms.clone(),
                Arc::clone(&history),
            ),
            response_subscriber: ProposalResponseSubscriber::new(
                Arc::clone(&relay),
                kms.clone(),
                Arc::clone(&history),
                subscriptions.clone(),
            ),
            message_sender: PushMessageSender::new(
                Arc::clone(&relay),
                Arc::clone(&history),
                subscriptions.clone(),
            ),
            delete_service: DeletePushSubscriptionService::new(
                Arc::clone(&relay),
                kms.clone(),
                Arc::clone(&history),
                subscriptions.clone(),
                delete_events.clone(),
            ),
            delete_subscriber: DeletePushSubscriptionSubscriber::new(
                relay,
                kms,
                Arc::clone(&history),
                subscriptions.clone(),
                delete_events.clone(),
            ),
            delete_events,
            history,
            subscriptions,
        }
    }

    /// Propose a subscription for `account` over `pairing_topic`.
    pub async fn request(&self, pairing_topic: &Topic, account: Account) -> Result<RpcId> {
        self.proposer.request(pairing_topic, account).await
    }

    /// Send a notification on an active subscription.
    pub async fn notify(&self, topic: &Topic, message: &NotifyMessage) -> Result<RpcId> {
        self.message_sender.request(topic, message).await
    }

    pub async fn delete_subscription(&self, topic: &Topic) -> Result<()> {
        self.delete_service.delete(topic).await
    }

    pub fn get_active_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        self.subscriptions.get_all()
    }

    pub fn subscribe_responses(&self) -> broadcast::Receiver<PushResponseEvent> {
        self.response_subscriber.subscribe()
    }

    pub fn subscribe_deletes(&self) -> broadcast::Receiver<PushDeleteEvent> {
        self.delete_events.subscribe()
    }

    /// Route a decrypted inbound message.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        match inbound.message {
            RpcMessage::Request(request) if request.method == PUSH_DELETE.method => {
                self.delete_subscriber.handle(inbound.topic, request).await?;
            }
            RpcMessage::Request(request) => {
                debug!(method = %request.method, "ignoring unsupported request");
            }
            RpcMessage::Response(response) => {
                let is_proposal_response = self
                    .history
                    .get(response.id)?
                    .is_some_and(|record| record.request.method == PUSH_REQUEST.method);
                if is_proposal_response {
                    self.response_subscriber
                        .handle(response, inbound.sender_public_key)
                        .await?;
                } else {
                    resolve_quietly(&self.history, response)?;
                }
            }
        }
        Ok(())
    }
}
