//! Reader-only decryption of push payloads.
//!
//! Both services open key material and subscriptions through the shared
//! store and never write to it.

use std::sync::Arc;

use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::storage::SharedStore;
use pushkit_lib::{Account, AppMetadata, RpcRequest, Topic};
use pushkit_subscriptions::protocol::PUSH_MESSAGE;
use pushkit_subscriptions::{NotifyMessage, PushSubscription, SubscriptionStore};
use serde_json::Value;

use crate::error::{DecryptionError, Result};

/// Shared lookup of keys and subscriptions for one topic.
#[derive(Clone)]
struct TopicReader {
    kms: KeyManagementService,
    subscriptions: SubscriptionStore,
}

impl TopicReader {
    fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            kms: KeyManagementService::new(Arc::clone(&store)),
            subscriptions: SubscriptionStore::new(store),
        }
    }

    fn decrypt(&self, topic: &str, ciphertext: &str) -> Result<(Topic, Vec<u8>)> {
        let parsed =
            Topic::new(topic).map_err(|_| DecryptionError::KeyNotFound(topic.to_string()))?;
        let (plaintext, _) = self
            .kms
            .decrypt(&parsed, ciphertext)
            .map_err(|e| DecryptionError::from_kms(topic, e))?;
        Ok((parsed, plaintext))
    }

    /// A missing or unreadable subscription record is not an error here;
    /// it only costs display details.
    fn subscription(&self, topic: &Topic) -> Option<PushSubscription> {
        self.subscriptions.get(topic).ok().flatten()
    }
}

/// Decrypts `wc_pushMessage` payloads.
#[derive(Clone)]
pub struct NotifyDecryptionService {
    reader: TopicReader,
}

impl NotifyDecryptionService {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            reader: TopicReader::new(store),
        }
    }

    /// Decrypt and parse a notification. Also returns the subscription
    /// account when the topic is known.
    pub fn decrypt_message(
        &self,
        topic: &str,
        ciphertext: &str,
    ) -> Result<(NotifyMessage, Option<Account>)> {
        let (topic, plaintext) = self.reader.decrypt(topic, ciphertext)?;
        let message = parse_notify_message(&plaintext)?;
        let account = self.reader.subscription(&topic).map(|s| s.account);
        Ok((message, account))
    }
}

/// Accepts a bare message object or a `wc_pushMessage` request wrapping it.
fn parse_notify_message(plaintext: &[u8]) -> Result<NotifyMessage> {
    let value: Value = serde_json::from_slice(plaintext)?;
    if value.get("method").is_none() {
        return Ok(serde_json::from_value(value)?);
    }

    let request: RpcRequest = serde_json::from_value(value)?;
    if request.method != PUSH_MESSAGE.method {
        return Err(DecryptionError::MalformedMessage(format!(
            "unexpected method {}",
            request.method
        )));
    }
    request
        .params_as()
        .ok_or_else(|| DecryptionError::MalformedMessage("missing params".into()))?
        .map_err(Into::into)
}

/// Decrypts wallet session and auth requests.
#[derive(Clone)]
pub struct Web3WalletDecryptionService {
    reader: TopicReader,
}

impl Web3WalletDecryptionService {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            reader: TopicReader::new(store),
        }
    }

    pub fn decrypt_message(&self, topic: &str, ciphertext: &str) -> Result<RpcRequest> {
        let (_, plaintext) = self.reader.decrypt(topic, ciphertext)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Counterparty metadata for `topic`, if recorded.
    pub fn get_metadata(&self, topic: &str) -> Option<AppMetadata> {
        let topic = Topic::new(topic).ok()?;
        self.reader.subscription(&topic).map(|s| s.metadata)
    }
}

/// Banner title for a wallet request method.
pub fn method_label(method: &str) -> &str {
    match method {
        "wc_sessionPropose" => "Session Proposal",
        "wc_sessionRequest" => "Session Request",
        "wc_authRequest" => "Auth Request",
        other => other,
    }
}
