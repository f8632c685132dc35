//! Dapp side of the subscription handshake.

use std::sync::Arc;

use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::{Account, AgreementPublicKey, AppMetadata, RpcId, RpcRequest, Topic};
use tracing::{debug, warn};

use crate::protocol::PUSH_REQUEST;
use crate::relay::RelayClient;
use crate::rpc_history::RpcHistory;
use crate::types::PushRequestParams;
use crate::Result;

/// Sends `wc_pushRequest` proposals to a paired wallet.
pub struct PushProposer {
    metadata: AppMetadata,
    relay: Arc<dyn RelayClient>,
    kms: KeyManagementService,
    history: Arc<RpcHistory>,
}

impl PushProposer {
    pub fn new(
        metadata: AppMetadata,
        relay: Arc<dyn RelayClient>,
        kms: KeyManagementService,
        history: Arc<RpcHistory>,
    ) -> Self {
        Self {
            metadata,
            relay,
            kms,
            history,
        }
    }

    /// Propose a subscription for `account` over an existing pairing.
    ///
    /// The wallet answers on the response topic of our fresh public key.
    #[tracing::instrument(skip(self), fields(pairing = %pairing_topic.short()))]
    pub async fn request(&self, pairing_topic: &Topic, account: Account) -> Result<RpcId> {
        let public_key = self.kms.create_x25519_key_pair()?;
        let response_topic = Topic::response_topic(&public_key);

        match self
            .send_proposal(pairing_topic, account, &public_key, &response_topic)
            .await
        {
            Ok(id) => {
                debug!(%id, response_topic = %response_topic.short(), "push proposal sent");
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "push proposal failed, rolling back");
                if let Err(unsubscribe_err) = self.relay.unsubscribe(&response_topic).await {
                    debug!(error = %unsubscribe_err, "unsubscribe during rollback failed");
                }
                if let Err(cleanup_err) = self
                    .kms
                    .delete_public_key(&response_topic)
                    .and_then(|_| self.kms.delete_private_key(&public_key))
                {
                    warn!(error = %cleanup_err, "failed to remove proposal keys");
                }
                Err(e)
            }
        }
    }

    async fn send_proposal(
        &self,
        pairing_topic: &Topic,
        account: Account,
        public_key: &AgreementPublicKey,
        response_topic: &Topic,
    ) -> Result<RpcId> {
        self.kms.set_public_key(public_key, response_topic)?;
        self.relay.subscribe(response_topic).await?;

        let params = PushRequestParams {
            public_key: public_key.to_hex(),
            metadata: self.metadata.clone(),
            account,
        };
        let request = RpcRequest::new(PUSH_REQUEST.method, params)?;
        let id = request.id;

        self.history.set(pairing_topic.clone(), request.clone())?;
        self.relay
            .request(pairing_topic, &request, &PUSH_REQUEST)
            .await?;
        Ok(id)
    }
}
