//! The decryption pipeline against a store written the way the main app
//! writes it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pushkit_decryption::{
    expiry_channel, ContentEnricher, DecryptionError, DecryptionEvent, DecryptionObserver,
    ExpirySignal, NotificationContent, NotificationRequest, NotificationService, SubProtocol,
    TagTable, FAILURE_TITLE, KEY_MISSING_TITLE,
};
use pushkit_lib::codec::{self, EnvelopeType};
use pushkit_lib::config::ExtensionConfig;
use pushkit_lib::keys::AgreementPrivateKey;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::storage::InMemoryStore;
use pushkit_lib::{AgreementKeys, RpcRequest, SymmetricKey, Topic};
use pushkit_subscriptions::test_utils::fixtures;
use pushkit_subscriptions::{
    NotifyMessage, PushSubscription, RelayProtocolOptions, SubscriptionStore,
};
use serde_json::json;

const HI_YO: &str =
    r#"{"title":"Hi","body":"Yo","icon":"","url":"https://gm.walletconnect.com","type":""}"#;

struct Group {
    store: InMemoryStore,
    kms: KeyManagementService,
    topic: Topic,
}

fn group() -> Group {
    let store = InMemoryStore::new("group.com.pushkit.test");
    let kms = KeyManagementService::new(Arc::new(store.clone()));
    let keys = AgreementKeys {
        shared_key: SymmetricKey::generate(),
        public_key: AgreementPrivateKey::generate().public_key(),
    };
    let topic = keys.derived_topic();
    kms.set_agreement_secret(&keys, &topic).unwrap();
    Group { store, kms, topic }
}

impl Group {
    fn service(&self, config: ExtensionConfig) -> NotificationService {
        NotificationService::new(Arc::new(self.store.reader()), config)
    }

    fn push(&self, plaintext: &str, tag: u32) -> NotificationRequest {
        let message = self
            .kms
            .encrypt(&self.topic, plaintext.as_bytes(), EnvelopeType::Type0)
            .unwrap();
        NotificationRequest::new(NotificationContent::encrypted(
            self.topic.as_str(),
            message,
            tag,
        ))
    }

    fn subscribe(&self) {
        let subscription = PushSubscription {
            topic: self.topic.clone(),
            account: fixtures::account(),
            relay: RelayProtocolOptions::default(),
            metadata: fixtures::metadata(),
        };
        SubscriptionStore::new(Arc::new(self.store.clone()))
            .set(&subscription, &self.topic)
            .unwrap();
    }
}

fn no_enrichment() -> ExtensionConfig {
    ExtensionConfig {
        enrich_content: false,
        ..ExtensionConfig::default()
    }
}

/// Waits far longer than any test deadline.
struct SlowEnricher;

#[async_trait]
impl ContentEnricher for SlowEnricher {
    async fn enrich(
        &self,
        mut content: NotificationContent,
        _message: NotifyMessage,
        _topic: String,
    ) -> pushkit_decryption::Result<NotificationContent> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        content.body = "late".into();
        Ok(content)
    }
}

struct PanickingEnricher;

#[async_trait]
impl ContentEnricher for PanickingEnricher {
    async fn enrich(
        &self,
        _content: NotificationContent,
        _message: NotifyMessage,
        _topic: String,
    ) -> pushkit_decryption::Result<NotificationContent> {
        panic!("enricher bug");
    }
}

struct FailingEnricher;

#[async_trait]
impl ContentEnricher for FailingEnricher {
    async fn enrich(
        &self,
        _content: NotificationContent,
        _message: NotifyMessage,
        _topic: String,
    ) -> pushkit_decryption::Result<NotificationContent> {
        Err(DecryptionError::Enrichment("offline".into()))
    }
}

struct ThreadingEnricher;

#[async_trait]
impl ContentEnricher for ThreadingEnricher {
    async fn enrich(
        &self,
        mut content: NotificationContent,
        message: NotifyMessage,
        _topic: String,
    ) -> pushkit_decryption::Result<NotificationContent> {
        content.thread_identifier = Some(format!("thread-{}", message.title));
        Ok(content)
    }
}

#[tokio::test]
async fn test_notify_message_decrypts_to_title_and_body() {
    let g = group();
    let content = g
        .service(no_enrichment())
        .did_receive(g.push(HI_YO, 4002), ExpirySignal::never())
        .await;

    assert_eq!(content.title, "Hi");
    assert_eq!(content.body, "Yo");
    assert_eq!(content.subtitle, "https://gm.walletconnect.com");
    assert!(content.attachments.is_empty());
}

#[tokio::test]
async fn test_wrapped_notify_message() {
    let g = group();
    let request = RpcRequest::new(
        "wc_pushMessage",
        json!({"title": "Hi", "body": "Yo", "icon": "", "url": "", "type": ""}),
    )
    .unwrap();
    let plaintext = serde_json::to_string(&request).unwrap();

    let content = g
        .service(no_enrichment())
        .did_receive(g.push(&plaintext, 4002), ExpirySignal::never())
        .await;
    assert_eq!((content.title.as_str(), content.body.as_str()), ("Hi", "Yo"));
}

#[tokio::test]
async fn test_unknown_tag_leaves_content_unchanged() {
    let g = group();
    let request = g.push(HI_YO, 9999);
    let original = request.content.clone();

    let content = g
        .service(no_enrichment())
        .did_receive(request, ExpirySignal::never())
        .await;
    assert_eq!(content, original);
}

#[tokio::test]
async fn test_custom_tag_table() {
    let g = group();
    let service = g
        .service(no_enrichment())
        .with_tags(TagTable::empty().with(SubProtocol::Notify, &[9999]));

    let content = service
        .did_receive(g.push(HI_YO, 9999), ExpirySignal::never())
        .await;
    assert_eq!(content.title, "Hi");

    let request = g.push(HI_YO, 4002);
    let original = request.content.clone();
    let content = service.did_receive(request, ExpirySignal::never()).await;
    assert_eq!(content, original);
}

#[tokio::test]
async fn test_missing_payload_fields_leave_content_unchanged() {
    let g = group();
    let mut request = g.push(HI_YO, 4002);
    request.content.user_info.remove("topic");
    let original = request.content.clone();

    let content = g
        .service(no_enrichment())
        .did_receive(request, ExpirySignal::never())
        .await;
    assert_eq!(content, original);
}

#[tokio::test]
async fn test_absent_topic_gives_generic_content() {
    let g = group();
    let request = g.push(HI_YO, 4002);
    g.kms.delete_agreement_secret(&g.topic).unwrap();

    let content = g
        .service(no_enrichment())
        .did_receive(request, ExpirySignal::never())
        .await;
    assert_eq!(content.title, KEY_MISSING_TITLE);
    assert!(!content.body.contains("Yo"));
}

#[tokio::test]
async fn test_tampered_ciphertext_gives_error_content() {
    let g = group();
    let forged = codec::encode(&SymmetricKey::generate(), HI_YO.as_bytes(), EnvelopeType::Type0)
        .unwrap();
    let request = NotificationRequest::new(NotificationContent::encrypted(
        g.topic.as_str(),
        forged,
        4002,
    ));

    let content = g
        .service(no_enrichment())
        .did_receive(request, ExpirySignal::never())
        .await;
    assert_eq!(content.title, FAILURE_TITLE);
    assert!(content.body.starts_with("decryption failed"));
    assert!(!content.body.contains("Yo"));
}

#[tokio::test]
async fn test_malformed_plaintext_gives_error_content() {
    let g = group();
    let content = g
        .service(no_enrichment())
        .did_receive(g.push(r#"{"title":"only"}"#, 4002), ExpirySignal::never())
        .await;
    assert_eq!(content.title, FAILURE_TITLE);
    assert!(content.body.starts_with("malformed message"));
}

#[tokio::test]
async fn test_web3wallet_request_label_and_metadata() {
    let g = group();
    g.subscribe();
    let request = RpcRequest::new("wc_sessionRequest", json!({"chainId": "eip155:1"})).unwrap();
    let plaintext = serde_json::to_string(&request).unwrap();

    let content = g
        .service(no_enrichment())
        .did_receive(g.push(&plaintext, 1108), ExpirySignal::never())
        .await;
    assert_eq!(content.title, "Session Request");
    assert_eq!(content.subtitle, fixtures::metadata().url);
}

#[tokio::test]
async fn test_observer_events() {
    let g = group();
    g.subscribe();
    let (observer, mut events) = DecryptionObserver::channel();
    let service = g
        .service(ExtensionConfig::default())
        .with_observer(observer)
        .with_enricher(Arc::new(ThreadingEnricher));

    let content = service
        .did_receive(g.push(HI_YO, 4002), ExpirySignal::never())
        .await;
    assert_eq!(content.thread_identifier.as_deref(), Some("thread-Hi"));

    assert_eq!(
        events.try_recv().unwrap(),
        DecryptionEvent::Decrypted {
            topic: g.topic.to_string(),
            protocol: SubProtocol::Notify,
            account: Some(fixtures::account()),
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        DecryptionEvent::Enriched {
            topic: g.topic.to_string()
        }
    );

    let request = g.push(HI_YO, 4002);
    g.kms.delete_agreement_secret(&g.topic).unwrap();
    service.did_receive(request, ExpirySignal::never()).await;
    assert!(matches!(
        events.try_recv().unwrap(),
        DecryptionEvent::KeyMissing { .. }
    ));
}

#[tokio::test]
async fn test_deadline_returns_minimal_content() {
    let g = group();
    let config = ExtensionConfig {
        deadline_ms: 50,
        enrich_content: true,
    };
    let service = g.service(config).with_enricher(Arc::new(SlowEnricher));

    let content = tokio::time::timeout(
        Duration::from_secs(5),
        service.did_receive(g.push(HI_YO, 4002), ExpirySignal::never()),
    )
    .await
    .unwrap();
    assert_eq!(content.title, "Hi");
    assert_eq!(content.body, "Yo");
}

#[tokio::test]
async fn test_host_expiry_returns_best_attempt() {
    let g = group();
    let service = g
        .service(ExtensionConfig::default())
        .with_enricher(Arc::new(SlowEnricher));
    let (handle, signal) = expiry_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.expire();
    });
    let content = tokio::time::timeout(
        Duration::from_secs(5),
        service.did_receive(g.push(HI_YO, 4002), signal),
    )
    .await
    .unwrap();
    assert_eq!(content.body, "Yo");
}

#[tokio::test]
async fn test_enricher_panic_keeps_minimal_content() {
    let g = group();
    let service = g
        .service(ExtensionConfig::default())
        .with_enricher(Arc::new(PanickingEnricher));

    let content = service
        .did_receive(g.push(HI_YO, 4002), ExpirySignal::never())
        .await;
    assert_eq!((content.title.as_str(), content.body.as_str()), ("Hi", "Yo"));
}

#[tokio::test]
async fn test_enricher_failure_keeps_minimal_content() {
    let g = group();
    let service = g
        .service(ExtensionConfig::default())
        .with_enricher(Arc::new(FailingEnricher));

    let content = service
        .did_receive(g.push(HI_YO, 4002), ExpirySignal::never())
        .await;
    assert_eq!(content.title, "Hi");
    assert!(content.thread_identifier.is_none());
}

#[tokio::test]
async fn test_enrichment_disabled_skips_enricher() {
    let g = group();
    let service = g
        .service(no_enrichment())
        .with_enricher(Arc::new(ThreadingEnricher));

    let content = service
        .did_receive(g.push(HI_YO, 4002), ExpirySignal::never())
        .await;
    assert!(content.thread_identifier.is_none());
}

#[cfg(feature = "http-client")]
mod icon_download {
    use super::*;
    use pushkit_decryption::IconAttachmentEnricher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_icon_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/icon.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let g = group();
        let dir = tempfile::tempdir().unwrap();
        let service = g
            .service(ExtensionConfig::default())
            .with_enricher(Arc::new(IconAttachmentEnricher::new(dir.path()).unwrap()));
        let message = NotifyMessage::new("Hi", "Yo")
            .with_icon(format!("{}/icon.png", server.uri()))
            .with_type("promotional");
        let plaintext = serde_json::to_string(&message).unwrap();

        let content = service
            .did_receive(g.push(&plaintext, 4002), ExpirySignal::never())
            .await;
        assert_eq!(content.thread_identifier.as_deref(), Some("promotional"));
        assert_eq!(content.attachments.len(), 1);
        let attachment = &content.attachments[0];
        assert_eq!(attachment.identifier, "icon");
        assert!(attachment.path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&attachment.path).unwrap(), vec![1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_icon_download_failure_keeps_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let g = group();
        let dir = tempfile::tempdir().unwrap();
        let service = g
            .service(ExtensionConfig::default())
            .with_enricher(Arc::new(IconAttachmentEnricher::new(dir.path()).unwrap()));
        let message =
            NotifyMessage::new("Hi", "Yo").with_icon(format!("{}/missing.png", server.uri()));
        let plaintext = serde_json::to_string(&message).unwrap();

        let content = service
            .did_receive(g.push(&plaintext, 4002), ExpirySignal::never())
            .await;
        assert_eq!(content.body, "Yo");
        assert!(content.attachments.is_empty());
    }
}
