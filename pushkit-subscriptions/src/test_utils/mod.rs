//! Test utilities for the push protocol.
//!
//! - [`MemoryRelay`]: a paired in-memory relay that seals and opens payloads
//!   with each side's KMS, records every publish and can be told to fail.
//! - [`FailingStore`]: a store wrapper that refuses writes under a prefix.
//! - [`fixtures`]: canned accounts, metadata and proposals.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pushkit_subscriptions::test_utils::{pair_kms, MemoryRelay};
//!
//! let pairing_topic = pair_kms(&wallet_kms, &dapp_kms)?;
//! let (wallet_relay, dapp_relay) = MemoryRelay::pair(wallet_kms, dapp_kms);
//! wallet_relay.subscribe(&pairing_topic).await?;
//! ```

mod failing_store;
pub mod fixtures;
mod memory_relay;

pub use failing_store::FailingStore;
pub use memory_relay::{MemoryRelay, PublishedMessage, RelayOperation};

use pushkit_lib::keys::AgreementPrivateKey;
use pushkit_lib::kms::KeyManagementService;
use pushkit_lib::{AgreementKeys, SymmetricKey, Topic};

/// Give both KMS instances the same pairing secret and return its topic.
pub fn pair_kms(a: &KeyManagementService, b: &KeyManagementService) -> pushkit_lib::Result<Topic> {
    let keys = AgreementKeys {
        shared_key: SymmetricKey::generate(),
        public_key: AgreementPrivateKey::generate().public_key(),
    };
    let topic = keys.derived_topic();
    a.set_agreement_secret(&keys, &topic)?;
    b.set_agreement_secret(&keys, &topic)?;
    Ok(topic)
}
