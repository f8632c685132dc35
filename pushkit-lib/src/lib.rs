//! PushKit core library.
//!
//! Key agreement, topic derivation, the envelope codec and the shared
//! storage that both the main process and the notification extension read.
//! The subscription state machine lives in `pushkit-subscriptions`; the
//! out-of-process decryption pipeline in `pushkit-decryption`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pushkit_lib::kms::KeyManagementService;
//! use pushkit_lib::storage::InMemoryStore;
//! use pushkit_lib::Topic;
//!
//! let dapp = KeyManagementService::new(Arc::new(InMemoryStore::new("group.dapp")));
//! let wallet = KeyManagementService::new(Arc::new(InMemoryStore::new("group.wallet")));
//!
//! let dapp_public = dapp.create_x25519_key_pair().unwrap();
//! let wallet_keys = wallet.generate_agreement_keys(&dapp_public).unwrap();
//! let dapp_keys = dapp
//!     .perform_key_agreement(&dapp_public, &wallet_keys.public_key)
//!     .unwrap();
//!
//! assert_eq!(dapp_keys.derived_topic(), wallet_keys.derived_topic());
//! assert_ne!(Topic::response_topic(&dapp_public), wallet_keys.derived_topic());
//! ```

pub mod account;
pub mod codec;
pub mod config;
pub mod echo;
pub mod errors;
pub mod keys;
pub mod kms;
pub mod metadata;
pub mod rpc;
pub mod storage;
pub mod topic;

pub use account::Account;
pub use config::PushkitConfig;
pub use errors::{PushkitError, PushkitErrorCode};
pub use keys::{AgreementKeys, AgreementPublicKey, SymmetricKey};
pub use metadata::AppMetadata;
pub use rpc::{RpcId, RpcRequest, RpcResponse};
pub use topic::Topic;

/// Common result alias for PushKit operations.
pub type Result<T> = std::result::Result<T, PushkitError>;
