//! Optional content enrichment.
//!
//! Runs after the minimal content is ready. The service gives it whatever
//! time is left before the deadline. A failure or panic keeps the minimal
//! content.
//!
//! # Feature Flags
//!
//! [`IconAttachmentEnricher`] downloads icons with reqwest and needs the
//! `http-client` feature (on by default). Without it enrichment always
//! fails, which leaves content unchanged.

use std::path::PathBuf;

use async_trait::async_trait;
use pushkit_subscriptions::NotifyMessage;

use crate::content::NotificationContent;
#[cfg(feature = "http-client")]
use crate::content::NotificationAttachment;
use crate::error::{DecryptionError, Result};

/// Adds optional details to decrypted notification content.
#[async_trait]
pub trait ContentEnricher: Send + Sync {
    async fn enrich(
        &self,
        content: NotificationContent,
        message: NotifyMessage,
        topic: String,
    ) -> Result<NotificationContent>;
}

/// Downloads the message icon and attaches it to the content.
///
/// Messages of the same `type` share a thread.
pub struct IconAttachmentEnricher {
    dir: PathBuf,
    #[cfg(feature = "http-client")]
    client: reqwest::Client,
}

impl IconAttachmentEnricher {
    /// Attachments are written below `dir`.
    #[cfg(feature = "http-client")]
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| DecryptionError::Enrichment(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            dir: dir.into(),
            client,
        })
    }

    #[cfg(not(feature = "http-client"))]
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self { dir: dir.into() })
    }

    /// Write attachments below the system temp directory.
    pub fn in_temp_dir() -> Result<Self> {
        Self::new(std::env::temp_dir().join("pushkit-attachments"))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ContentEnricher for IconAttachmentEnricher {
    async fn enrich(
        &self,
        mut content: NotificationContent,
        message: NotifyMessage,
        topic: String,
    ) -> Result<NotificationContent> {
        if !message.message_type.is_empty() {
            content.thread_identifier = Some(message.message_type.clone());
        }
        if message.icon.is_empty() {
            return Ok(content);
        }
        self.attach_icon(content, &message.icon, &topic).await
    }
}

impl IconAttachmentEnricher {
    #[cfg(feature = "http-client")]
    async fn attach_icon(
        &self,
        mut content: NotificationContent,
        icon: &str,
        topic: &str,
    ) -> Result<NotificationContent> {
        let url = reqwest::Url::parse(icon)
            .map_err(|e| DecryptionError::Enrichment(format!("invalid icon url: {}", e)))?;
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("icon")
            .to_string();

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DecryptionError::Enrichment(format!("icon download failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| DecryptionError::Enrichment(format!("icon download failed: {}", e)))?;

        let dir = self.dir.join(hex::encode(rand::random::<[u8; 8]>()));
        let path = dir.join(&file_name);
        let store_error = |e: std::io::Error| {
            DecryptionError::Enrichment(format!("failed to store icon: {}", e))
        };
        tokio::fs::create_dir_all(&dir).await.map_err(store_error)?;
        tokio::fs::write(&path, &bytes).await.map_err(store_error)?;

        tracing::debug!(topic = %topic, file = %file_name, "attached sender icon");
        content.attachments.push(NotificationAttachment {
            identifier: "icon".to_string(),
            path,
        });
        Ok(content)
    }

    #[cfg(not(feature = "http-client"))]
    async fn attach_icon(
        &self,
        _content: NotificationContent,
        _icon: &str,
        _topic: &str,
    ) -> Result<NotificationContent> {
        Err(DecryptionError::Enrichment(
            "icon download needs the 'http-client' feature".to_string(),
        ))
    }
}
