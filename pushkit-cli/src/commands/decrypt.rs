//! Decrypt command - run the notification pipeline like the extension does

use std::io::Read;
use std::sync::Arc;

use anyhow::Result;
use pushkit_decryption::{
    expiry_channel, IconAttachmentEnricher, NotificationContent, NotificationRequest,
    NotificationService,
};

use super::Context;
use crate::ui;

/// Read a payload, run the pipeline and print the resulting content.
///
/// Never fails on bad input: an unreadable payload prints empty content,
/// and Ctrl-C returns the best attempt so far.
pub async fn run(ctx: &Context, payload: &str) -> Result<()> {
    let request = match read_payload(payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable payload");
            return ui::json(&NotificationContent::default());
        }
    };

    let mut service = NotificationService::open(
        ctx.store_root(),
        ctx.config.group_identifier.clone(),
        ctx.config.extension.clone(),
    );
    if ctx.config.extension.enrich_content {
        match IconAttachmentEnricher::in_temp_dir() {
            Ok(enricher) => service = service.with_enricher(Arc::new(enricher)),
            Err(e) => tracing::warn!(error = %e, "enrichment unavailable"),
        }
    }

    let (expiry, signal) = expiry_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            expiry.expire();
        }
    });

    let content = service.did_receive(request, signal).await;
    ui::json(&content)
}

fn read_payload(source: &str) -> Result<NotificationRequest> {
    let raw = if source == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(NotificationRequest::from_json(&raw)?)
}
