//! The notification service entry point.
//!
//! [`NotificationService::did_receive`] turns an encrypted push into
//! displayable content. It never fails: every error becomes content, and the
//! host's expiry signal or the configured deadline returns whatever content
//! is ready at that moment.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pushkit_lib::config::ExtensionConfig;
use pushkit_lib::storage::{FileStore, SharedStore};
use pushkit_subscriptions::NotifyMessage;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::content::{NotificationContent, NotificationRequest, PushPayload};
use crate::decryptor::{method_label, NotifyDecryptionService, Web3WalletDecryptionService};
use crate::enricher::ContentEnricher;
use crate::error::DecryptionError;
use crate::observer::{DecryptionEvent, DecryptionObserver};
use crate::tags::{SubProtocol, TagTable};

/// Title shown when no key is known for the topic.
pub const KEY_MISSING_TITLE: &str = "New message";

/// Title shown when decryption or parsing failed.
pub const FAILURE_TITLE: &str = "Error";

/// Host side of the expiry signal.
#[derive(Debug)]
pub struct ExpiryHandle {
    sender: watch::Sender<bool>,
}

impl ExpiryHandle {
    /// Tell the service to return its best attempt now.
    pub fn expire(&self) {
        self.sender.send_replace(true);
    }
}

/// Service side of the expiry signal.
#[derive(Debug, Clone)]
pub struct ExpirySignal {
    receiver: watch::Receiver<bool>,
}

impl ExpirySignal {
    /// A signal that never fires. Only the configured deadline applies.
    pub fn never() -> Self {
        expiry_channel().1
    }

    pub fn is_expired(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the host expires the request. A dropped handle can no
    /// longer expire it, so this then stays pending.
    pub async fn expired(&mut self) {
        if self.receiver.wait_for(|expired| *expired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn expiry_channel() -> (ExpiryHandle, ExpirySignal) {
    let (sender, receiver) = watch::channel(false);
    (ExpiryHandle { sender }, ExpirySignal { receiver })
}

/// Reader-only pipeline from encrypted push to displayable content.
pub struct NotificationService {
    notify: NotifyDecryptionService,
    web3wallet: Web3WalletDecryptionService,
    tags: TagTable,
    config: ExtensionConfig,
    enricher: Option<Arc<dyn ContentEnricher>>,
    observer: Option<DecryptionObserver>,
}

impl NotificationService {
    /// Build a service over `store`. The store should be a read-only handle
    /// on the shared group namespace.
    pub fn new(store: Arc<dyn SharedStore>, config: ExtensionConfig) -> Self {
        Self {
            notify: NotifyDecryptionService::new(Arc::clone(&store)),
            web3wallet: Web3WalletDecryptionService::new(store),
            tags: TagTable::default(),
            config,
            enricher: None,
            observer: None,
        }
    }

    /// Open the group namespace under `root` read-only.
    pub fn open(
        root: impl AsRef<Path>,
        group_identifier: impl Into<String>,
        config: ExtensionConfig,
    ) -> Self {
        let store = FileStore::open_read_only(root, group_identifier);
        Self::new(Arc::new(store), config)
    }

    pub fn with_tags(mut self, tags: TagTable) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn ContentEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_observer(mut self, observer: DecryptionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// Produce content for one push.
    ///
    /// Returns the original content for unexpired requests that carry no
    /// payload or an unknown tag. Decryption runs before any enrichment, so
    /// a successful decryption always shows at least its title and body.
    pub async fn did_receive(
        &self,
        request: NotificationRequest,
        mut expiry: ExpirySignal,
    ) -> NotificationContent {
        let started = Instant::now();
        let original = request.content;
        if expiry.is_expired() {
            return original;
        }

        let Some(payload) = original.push_payload() else {
            debug!("push without an encrypted payload");
            return original;
        };
        let Some(protocol) = self.tags.lookup(payload.tag) else {
            debug!(tag = payload.tag, "unknown tag, leaving content unchanged");
            return original;
        };

        let (content, message) = match protocol {
            SubProtocol::Notify => self.notify_content(&original, &payload),
            SubProtocol::Web3Wallet => (self.web3wallet_content(&original, &payload), None),
        };

        let Some(message) = message else {
            return content;
        };
        let enricher = match &self.enricher {
            Some(enricher) if self.config.enrich_content => Arc::clone(enricher),
            _ => return content,
        };

        let topic = payload.topic;
        let mut task = tokio::spawn({
            let content = content.clone();
            let topic = topic.clone();
            async move { enricher.enrich(content, message, topic).await }
        });
        let deadline = sleep_until(started + Duration::from_millis(self.config.deadline_ms));

        tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(enriched)) => {
                    self.emit(DecryptionEvent::Enriched { topic });
                    enriched
                }
                Ok(Err(e)) => {
                    warn!(topic = %topic, error = %e, "enrichment failed");
                    content
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "enrichment task did not finish");
                    content
                }
            },
            _ = expiry.expired() => {
                debug!(topic = %topic, "expired, returning best attempt");
                task.abort();
                content
            }
            _ = deadline => {
                debug!(topic = %topic, "deadline reached, returning best attempt");
                task.abort();
                content
            }
        }
    }

    fn notify_content(
        &self,
        original: &NotificationContent,
        payload: &PushPayload,
    ) -> (NotificationContent, Option<NotifyMessage>) {
        match self.notify.decrypt_message(&payload.topic, &payload.message) {
            Ok((message, account)) => {
                self.emit(DecryptionEvent::Decrypted {
                    topic: payload.topic.clone(),
                    protocol: SubProtocol::Notify,
                    account,
                });
                let mut content = original.clone();
                content.title = message.title.clone();
                content.subtitle = message.url.clone();
                content.body = message.body.clone();
                (content, Some(message))
            }
            Err(e) => (self.failure_content(original, &payload.topic, e), None),
        }
    }

    fn web3wallet_content(
        &self,
        original: &NotificationContent,
        payload: &PushPayload,
    ) -> NotificationContent {
        match self.web3wallet.decrypt_message(&payload.topic, &payload.message) {
            Ok(request) => {
                self.emit(DecryptionEvent::Decrypted {
                    topic: payload.topic.clone(),
                    protocol: SubProtocol::Web3Wallet,
                    account: None,
                });
                let mut content = original.clone();
                content.title = method_label(&request.method).to_string();
                if let Some(metadata) = self.web3wallet.get_metadata(&payload.topic) {
                    content.subtitle = metadata.url;
                }
                content
            }
            Err(e) => self.failure_content(original, &payload.topic, e),
        }
    }

    fn failure_content(
        &self,
        original: &NotificationContent,
        topic: &str,
        error: DecryptionError,
    ) -> NotificationContent {
        let mut content = original.clone();
        content.subtitle.clear();
        match error {
            DecryptionError::KeyNotFound(_) => {
                debug!(topic = %topic, "no key for topic");
                self.emit(DecryptionEvent::KeyMissing {
                    topic: topic.to_string(),
                });
                content.title = KEY_MISSING_TITLE.to_string();
                content.body.clear();
            }
            other => {
                warn!(topic = %topic, error = %other, "failed to decrypt push");
                let reason = other.to_string();
                self.emit(DecryptionEvent::Failed {
                    topic: topic.to_string(),
                    reason: reason.clone(),
                });
                content.title = FAILURE_TITLE.to_string();
                content.body = reason;
            }
        }
        content
    }

    fn emit(&self, event: DecryptionEvent) {
        if let Some(observer) = &self.observer {
            observer.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushkit_lib::storage::InMemoryStore;

    fn service() -> NotificationService {
        NotificationService::new(
            Arc::new(InMemoryStore::new("group.test").reader()),
            ExtensionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_expired_request_returns_original() {
        let (handle, signal) = expiry_channel();
        handle.expire();
        let original = NotificationContent::encrypted("ab", "cd", 4002).with_title("push");
        let content = service()
            .did_receive(NotificationRequest::new(original.clone()), signal)
            .await;
        assert_eq!(content, original);
    }

    #[tokio::test]
    async fn test_dropped_handle_never_expires() {
        let (handle, mut signal) = expiry_channel();
        drop(handle);
        assert!(!signal.is_expired());
        let waited =
            tokio::time::timeout(Duration::from_millis(20), signal.expired()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_invalid_topic_reads_as_missing_key() {
        let original = NotificationContent::encrypted("not-a-topic", "cd", 4002);
        let content = service()
            .did_receive(NotificationRequest::new(original), ExpirySignal::never())
            .await;
        assert_eq!(content.title, KEY_MISSING_TITLE);
    }
}
