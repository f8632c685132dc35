//! Subscription inspection commands

use anyhow::Result;
use pushkit_lib::Topic;
use pushkit_subscriptions::{PushSubscription, SubscriptionStore};

use super::Context;
use crate::ui;

fn store(ctx: &Context) -> SubscriptionStore {
    SubscriptionStore::new(ctx.group_reader())
}

/// List all active subscriptions
pub fn list(ctx: &Context) -> Result<()> {
    let subscriptions = store(ctx).get_all()?;

    ui::header("Active Subscriptions");
    if subscriptions.is_empty() {
        ui::info("No subscriptions found");
        return Ok(());
    }

    for subscription in &subscriptions {
        ui::separator();
        print_subscription(subscription);
    }
    ui::separator();
    ui::info(&format!("Total: {} subscription(s)", subscriptions.len()));
    Ok(())
}

/// Show one subscription
pub fn show(ctx: &Context, topic: &str) -> Result<()> {
    let topic = Topic::new(topic)?;
    match store(ctx).get(&topic)? {
        Some(subscription) => {
            ui::header("Subscription");
            print_subscription(&subscription);
        }
        None => {
            ui::error(&format!("No subscription for topic {}", topic.short()));
        }
    }
    Ok(())
}

fn print_subscription(subscription: &PushSubscription) {
    ui::key_value("Topic", subscription.topic.as_str());
    ui::key_value("Account", &subscription.account.to_string());
    ui::key_value("Dapp", &subscription.metadata.name);
    ui::key_value("URL", &subscription.metadata.url);
    ui::key_value("Relay", &subscription.relay.protocol);
}
