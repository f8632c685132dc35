//! Wallet side intake of `wc_pushRequest` proposals.

use std::sync::Arc;

use pushkit_lib::{RpcRequest, Topic};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{PushRequestEvent, EVENT_CHANNEL_CAPACITY};
use crate::responder::request_params;
use crate::rpc_history::RpcHistory;
use crate::{Result, SubscriptionError};

/// Records incoming proposals and announces them to the host.
pub struct PushRequestSubscriber {
    history: Arc<RpcHistory>,
    events: broadcast::Sender<PushRequestEvent>,
}

impl PushRequestSubscriber {
    pub fn new(history: Arc<RpcHistory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { history, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushRequestEvent> {
        self.events.subscribe()
    }

    /// Handle a proposal received on `topic`.
    ///
    /// A redelivered proposal is ignored. Returns whether an event was
    /// published.
    pub fn handle(&self, topic: Topic, request: RpcRequest) -> Result<bool> {
        let id = request.id;
        match self.history.set(topic, request.clone()) {
            Ok(()) => {}
            Err(SubscriptionError::DuplicateRequest(_)) => {
                debug!(%id, "ignoring redelivered push proposal");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let params = request_params(&request).inspect_err(|e| {
            warn!(%id, error = %e, "push proposal has malformed params");
        })?;

        info!(%id, dapp = %params.metadata.url, "push proposal received");
        // No receivers is not an error; the proposal stays in the ledger.
        let _ = self.events.send(PushRequestEvent {
            id,
            account: params.account,
            metadata: params.metadata,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use pushkit_lib::keys::AgreementPrivateKey;
    use pushkit_lib::storage::InMemoryStore;

    fn subscriber() -> PushRequestSubscriber {
        PushRequestSubscriber::new(Arc::new(RpcHistory::new(Arc::new(InMemoryStore::new(
            "main",
        )))))
    }

    #[test]
    fn test_publishes_once_per_request() {
        let subscriber = subscriber();
        let mut events = subscriber.subscribe();
        let request = fixtures::push_request(&AgreementPrivateKey::generate().public_key());
        let topic = Topic::generate();

        assert!(subscriber.handle(topic.clone(), request.clone()).unwrap());
        assert!(!subscriber.handle(topic, request.clone()).unwrap());

        let event = events.try_recv().unwrap();
        assert_eq!(event.id, request.id);
        assert_eq!(event.metadata, fixtures::metadata());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_malformed_params_are_recorded_but_not_announced() {
        let subscriber = subscriber();
        let mut events = subscriber.subscribe();
        let request = RpcRequest::new("wc_pushRequest", serde_json::json!({"x": 1})).unwrap();
        let id = request.id;

        let err = subscriber.handle(Topic::generate(), request).unwrap_err();
        assert!(matches!(err, SubscriptionError::MalformedParams(_)));
        assert!(subscriber.history.get(id).unwrap().is_some());
        assert!(events.try_recv().is_err());
    }
}
