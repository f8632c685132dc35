//! Events published to the host.
//!
//! Each client exposes one `tokio::sync::broadcast` channel per event kind.
//! A slow receiver that lags behind loses the oldest events, which is fine
//! for UI notifications; the ledger and the subscription store remain the
//! source of truth.

use pushkit_lib::{Account, AppMetadata, RpcId, Topic};

use crate::types::{NotifyMessage, PushError, PushSubscription};

/// Capacity of every event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A dapp proposed a subscription to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequestEvent {
    pub id: RpcId,
    pub account: Account,
    pub metadata: AppMetadata,
}

/// The wallet accepted a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscriptionResult {
    pub subscription: PushSubscription,
    /// The signed `subscriptionAuth` the wallet sent back.
    pub subscription_auth: String,
}

/// The wallet answered one of our proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponseEvent {
    pub id: RpcId,
    pub result: Result<PushSubscriptionResult, PushError>,
}

/// A notification arrived on an active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessageEvent {
    pub id: RpcId,
    pub topic: Topic,
    pub message: NotifyMessage,
    /// Publish time, unix seconds.
    pub published_at: i64,
}

/// A subscription was removed, locally or by the counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushDeleteEvent {
    pub topic: Topic,
}
