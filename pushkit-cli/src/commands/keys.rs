//! Key generation and diagnostic encryption

use anyhow::{Context as _, Result};
use pushkit_decryption::{NotificationContent, NotificationRequest};
use pushkit_lib::codec::EnvelopeType;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::Topic;

use super::Context;
use crate::ui;

/// Create a key pair in the shared store and print the topic a peer would
/// answer on.
pub fn keygen(ctx: &Context) -> Result<()> {
    let kms = KeyManagementService::new(ctx.group_writer()?);
    let public_key = kms.create_x25519_key_pair()?;
    let topic = Topic::response_topic(&public_key);
    kms.set_public_key(&public_key, &topic)?;

    tracing::info!(topic = %topic.short(), "key pair created");
    ui::header("New Key Pair");
    ui::key_value("Public Key", &public_key.to_hex());
    ui::key_value("Response Topic", topic.as_str());
    ui::success("Private key stored in the shared store");
    Ok(())
}

/// Encrypt `message` under the key stored for `topic` and print a push
/// payload that `decrypt` accepts.
pub fn encrypt(ctx: &Context, topic: &str, message: &str, tag: u32) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(message).context("message must be JSON")?;
    let topic = Topic::new(topic)?;

    let kms = KeyManagementService::new(ctx.group_reader());
    let ciphertext = kms
        .encrypt(&topic, message.as_bytes(), EnvelopeType::Type0)
        .with_context(|| format!("cannot encrypt on topic {}", topic.short()))?;

    ui::json(&NotificationRequest::new(NotificationContent::encrypted(
        topic.as_str(),
        ciphertext,
        tag,
    )))
}
