//! Notification content as the host sees it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A file attached to a notification, e.g. a downloaded sender icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAttachment {
    pub identifier: String,
    pub path: PathBuf,
}

/// Displayable notification content.
///
/// `user_info` holds the raw push payload fields; the encrypted message
/// travels there as `topic`, `message` and `tag`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationContent {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub user_info: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<NotificationAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_identifier: Option<String>,
}

impl NotificationContent {
    /// Content carrying an encrypted push payload.
    pub fn encrypted(topic: impl Into<String>, message: impl Into<String>, tag: u32) -> Self {
        let mut user_info = Map::new();
        user_info.insert("topic".into(), Value::String(topic.into()));
        user_info.insert("message".into(), Value::String(message.into()));
        user_info.insert("tag".into(), Value::from(tag));
        Self {
            user_info,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The encrypted payload fields, if all are present and well typed.
    pub fn push_payload(&self) -> Option<PushPayload> {
        let topic = self.user_info.get("topic")?.as_str()?;
        let message = self.user_info.get("message")?.as_str()?;
        let tag = u32::try_from(self.user_info.get("tag")?.as_u64()?).ok()?;
        Some(PushPayload {
            topic: topic.to_string(),
            message: message.to_string(),
            tag,
        })
    }
}

/// The encrypted part of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    pub topic: String,
    /// Base64 envelope.
    pub message: String,
    pub tag: u32,
}

/// What the host hands the extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub content: NotificationContent,
}

impl NotificationRequest {
    pub fn new(content: NotificationContent) -> Self {
        Self { content }
    }

    /// Parse a request from JSON, accepting `{"content": {...}}` or a bare
    /// content object.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value.get("content") {
            Some(Value::Object(_)) => serde_json::from_value(value),
            _ => Ok(Self::new(serde_json::from_value(value)?)),
        }
    }
}
