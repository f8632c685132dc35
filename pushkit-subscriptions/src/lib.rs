//! # PushKit Subscriptions
//!
//! The push subscription protocol between a dapp and a wallet on top of an
//! encrypted publish/subscribe relay.
//!
//! ## Handshake
//!
//! 1. The dapp sends `wc_pushRequest` with a fresh X25519 public key over an
//!    existing pairing ([`PushProposer`]).
//! 2. The wallet records it in the [`RpcHistory`] ledger and announces it
//!    ([`PushRequestSubscriber`]).
//! 3. The wallet agrees a shared key, subscribes to the derived topic and
//!    answers on the dapp's response topic with a signed authorization
//!    ([`PushRequestResponder`]). The subscription is committed only after
//!    the answer went out.
//! 4. The dapp derives the same key and topic
//!    ([`ProposalResponseSubscriber`]).
//!
//! Notifications then flow as `wc_pushMessage` on the subscription topic;
//! either side may end the subscription with `wc_pushDelete`.
//!
//! Key material and subscriptions live in the shared group store so the
//! notification extension can decrypt pushes on its own. The ledger lives in
//! the host's private store.

pub mod client;
pub mod delete;
pub mod error;
pub mod events;
pub mod identity;
pub mod messages;
pub mod proposal_response_subscriber;
pub mod proposer;
pub mod protocol;
pub mod relay;
pub mod request_subscriber;
pub mod responder;
pub mod rpc_history;
pub mod store;
pub mod types;

/// In-memory relay and fixtures.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{ClientStores, DappPushClient, WalletPushClient};
pub use delete::{DeletePushSubscriptionService, DeletePushSubscriptionSubscriber};
pub use error::{Result, SubscriptionError};
pub use events::{
    PushDeleteEvent, PushMessageEvent, PushRequestEvent, PushResponseEvent,
    PushSubscriptionResult,
};
pub use identity::{Ed25519IdentitySigner, IdentitySigner};
pub use messages::{PushMessageSender, PushMessageSubscriber};
pub use proposal_response_subscriber::ProposalResponseSubscriber;
pub use proposer::PushProposer;
pub use relay::{InboundMessage, RelayClient, RelayError};
pub use request_subscriber::PushRequestSubscriber;
pub use responder::{HandshakeState, PushRequestResponder};
pub use rpc_history::{RpcHistory, RpcRecord};
pub use store::{CodableStore, SubscriptionStore};
pub use types::{
    NotifyMessage, PushDeleteParams, PushError, PushRequestParams, PushSubscription,
    RelayProtocolOptions,
};
