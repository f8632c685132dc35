//! # PushKit Decryption
//!
//! Turns encrypted pushes into displayable notification content inside a
//! separate, short-lived process (a notification service extension).
//!
//! The extension only reads the shared group store the main app writes:
//! agreement secrets by topic and subscription records. It never writes.
//!
//! ## Pipeline
//!
//! 1. Extract `topic`, `message` and `tag` from the push payload.
//! 2. Route the tag through a [`TagTable`] to a [`SubProtocol`].
//! 3. Decrypt and parse synchronously into minimal content.
//! 4. Optionally enrich the content (e.g. attach the sender icon) in a
//!    separate task, bounded by the host's [`ExpirySignal`] and the
//!    configured deadline.
//!
//! ```no_run
//! use pushkit_decryption::{ExpirySignal, NotificationContent, NotificationRequest, NotificationService};
//! use pushkit_lib::config::ExtensionConfig;
//!
//! # async fn example() {
//! let service = NotificationService::open("/shared", "group.com.example", ExtensionConfig::default());
//! let request = NotificationRequest::new(NotificationContent::encrypted("topic", "ciphertext", 4002));
//! let content = service.did_receive(request, ExpirySignal::never()).await;
//! println!("{}: {}", content.title, content.body);
//! # }
//! ```

pub mod content;
pub mod decryptor;
pub mod enricher;
pub mod error;
pub mod observer;
pub mod service;
pub mod tags;

pub use content::{NotificationAttachment, NotificationContent, NotificationRequest, PushPayload};
pub use decryptor::{method_label, NotifyDecryptionService, Web3WalletDecryptionService};
pub use enricher::{ContentEnricher, IconAttachmentEnricher};
pub use error::{DecryptionError, Result};
pub use observer::{DecryptionEvent, DecryptionObserver};
pub use service::{
    expiry_channel, ExpiryHandle, ExpirySignal, NotificationService, FAILURE_TITLE,
    KEY_MISSING_TITLE,
};
pub use tags::{SubProtocol, TagTable};
