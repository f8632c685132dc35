//! Key & Topic Store.
//!
//! The key management service persists key material in a [`SharedStore`]
//! so the notification extension can open the same records read-only.
//!
//! # Record Layout
//!
//! ```text
//! kms.private.<public key hex>   [version][32 bytes private key]
//! kms.agreement.<topic>          [version][32 bytes shared key][32 bytes public key]
//! kms.public.<topic>             [version][32 bytes public key]
//! ```
//!
//! Every value starts with [`KMS_VALUE_VERSION`]; records with another
//! version are rejected instead of being misread.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::codec::{self, Envelope, EnvelopeType};
use crate::keys::{
    perform_key_agreement, AgreementKeys, AgreementPrivateKey, AgreementPublicKey, SymmetricKey,
    KEY_LENGTH,
};
use crate::storage::{SharedStore, StorageError};
use crate::topic::Topic;
use crate::{PushkitError, Result};

/// Current value format version.
pub const KMS_VALUE_VERSION: u8 = 1;

const PRIVATE_PREFIX: &str = "kms.private.";
const AGREEMENT_PREFIX: &str = "kms.agreement.";
const PUBLIC_PREFIX: &str = "kms.public.";

/// Key management over a shared store.
#[derive(Clone)]
pub struct KeyManagementService {
    store: Arc<dyn SharedStore>,
}

impl KeyManagementService {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Generate an X25519 key pair and keep the private key under its public
    /// key. Returns the public key.
    pub fn create_x25519_key_pair(&self) -> Result<AgreementPublicKey> {
        let private_key = AgreementPrivateKey::generate();
        let public_key = private_key.public_key();
        let bytes = Zeroizing::new(private_key.to_bytes());
        self.write_versioned(&private_key_id(&public_key), &[bytes.as_slice()])?;
        Ok(public_key)
    }

    /// Agree with `peer_public_key` using the stored private key for
    /// `self_public_key`.
    pub fn perform_key_agreement(
        &self,
        self_public_key: &AgreementPublicKey,
        peer_public_key: &AgreementPublicKey,
    ) -> Result<AgreementKeys> {
        let private_key = self
            .get_private_key(self_public_key)?
            .ok_or_else(|| PushkitError::not_found("private key", self_public_key.to_hex()))?;
        Ok(perform_key_agreement(&private_key, peer_public_key)?)
    }

    /// Create a stored key pair and agree with `peer_public_key` in one step.
    ///
    /// The private key stays in the store until
    /// [`delete_private_key`](Self::delete_private_key) is called.
    pub fn generate_agreement_keys(
        &self,
        peer_public_key: &AgreementPublicKey,
    ) -> Result<AgreementKeys> {
        let self_public_key = self.create_x25519_key_pair()?;
        match self.perform_key_agreement(&self_public_key, peer_public_key) {
            Ok(keys) => Ok(keys),
            Err(e) => {
                self.delete_private_key(&self_public_key)?;
                Err(e)
            }
        }
    }

    pub fn get_private_key(
        &self,
        public_key: &AgreementPublicKey,
    ) -> Result<Option<AgreementPrivateKey>> {
        let id = private_key_id(public_key);
        let Some(payload) = self.read_versioned(&id)? else {
            return Ok(None);
        };
        let bytes: [u8; KEY_LENGTH] = payload
            .as_slice()
            .try_into()
            .map_err(|_| StorageError::corrupted(&id, "private key has wrong length"))?;
        Ok(Some(AgreementPrivateKey::from_bytes(bytes)))
    }

    pub fn delete_private_key(&self, public_key: &AgreementPublicKey) -> Result<()> {
        Ok(self.store.delete(&private_key_id(public_key))?)
    }

    /// Persist the agreed keys for `topic`.
    pub fn set_agreement_secret(&self, keys: &AgreementKeys, topic: &Topic) -> Result<()> {
        self.write_versioned(
            &agreement_id(topic),
            &[
                keys.shared_key.as_bytes().as_slice(),
                keys.public_key.as_bytes().as_slice(),
            ],
        )
    }

    pub fn get_agreement_secret(&self, topic: &Topic) -> Result<Option<AgreementKeys>> {
        let id = agreement_id(topic);
        let Some(payload) = self.read_versioned(&id)? else {
            return Ok(None);
        };
        if payload.len() != 2 * KEY_LENGTH {
            return Err(StorageError::corrupted(&id, "agreement secret has wrong length").into());
        }
        let (shared, public) = payload.split_at(KEY_LENGTH);
        let shared_key = SymmetricKey::from_slice(shared)
            .ok_or_else(|| StorageError::corrupted(&id, "shared key has wrong length"))?;
        let public_key = AgreementPublicKey::from_slice(public)
            .map_err(|e| StorageError::corrupted(&id, e.to_string()))?;
        Ok(Some(AgreementKeys {
            shared_key,
            public_key,
        }))
    }

    pub fn delete_agreement_secret(&self, topic: &Topic) -> Result<()> {
        Ok(self.store.delete(&agreement_id(topic))?)
    }

    /// Remember our own public key for a topic we expect an answer on.
    pub fn set_public_key(&self, public_key: &AgreementPublicKey, topic: &Topic) -> Result<()> {
        self.write_versioned(&public_key_id(topic), &[public_key.as_bytes().as_slice()])
    }

    pub fn get_public_key(&self, topic: &Topic) -> Result<Option<AgreementPublicKey>> {
        let id = public_key_id(topic);
        let Some(payload) = self.read_versioned(&id)? else {
            return Ok(None);
        };
        let key = AgreementPublicKey::from_slice(&payload)
            .map_err(|e| StorageError::corrupted(&id, e.to_string()))?;
        Ok(Some(key))
    }

    pub fn delete_public_key(&self, topic: &Topic) -> Result<()> {
        Ok(self.store.delete(&public_key_id(topic))?)
    }

    /// Topics that currently have an agreement secret.
    pub fn agreement_topics(&self) -> Result<Vec<Topic>> {
        let mut topics = Vec::new();
        for key in self.store.keys(AGREEMENT_PREFIX)? {
            let Some(rest) = key.strip_prefix(AGREEMENT_PREFIX) else {
                continue;
            };
            if let Ok(topic) = Topic::new(rest) {
                topics.push(topic);
            }
        }
        Ok(topics)
    }

    /// Seal `plaintext` for `topic` with the stored agreement secret.
    pub fn encrypt(
        &self,
        topic: &Topic,
        plaintext: &[u8],
        envelope_type: EnvelopeType,
    ) -> Result<String> {
        let keys = self
            .get_agreement_secret(topic)?
            .ok_or_else(|| PushkitError::not_found("agreement secret", topic.as_str()))?;
        Ok(codec::encode(&keys.shared_key, plaintext, envelope_type)?)
    }

    /// Open a base64 envelope received on `topic`.
    ///
    /// Type 1 envelopes received on a topic that only has our own public key
    /// stored (a response topic on the proposing side) are opened by agreeing
    /// with the sender's key first. Returns the plaintext and, for type 1,
    /// the sender public key.
    pub fn decrypt(
        &self,
        topic: &Topic,
        encoded: &str,
    ) -> Result<(Vec<u8>, Option<AgreementPublicKey>)> {
        let envelope = Envelope::from_base64(encoded)?;
        let sender = envelope.sender_public_key().copied();

        let shared_key = match (self.get_agreement_secret(topic)?, sender) {
            (Some(keys), _) => keys.shared_key,
            (None, Some(sender)) => {
                let self_public_key = self
                    .get_public_key(topic)?
                    .ok_or_else(|| PushkitError::not_found("agreement secret", topic.as_str()))?;
                self.perform_key_agreement(&self_public_key, &sender)?
                    .shared_key
            }
            (None, None) => {
                return Err(PushkitError::not_found("agreement secret", topic.as_str()))
            }
        };

        let plaintext = codec::open(&shared_key, &envelope)?;
        Ok((plaintext, sender))
    }

    fn write_versioned(&self, id: &str, parts: &[&[u8]]) -> Result<()> {
        let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
        let mut value = Zeroizing::new(Vec::with_capacity(len));
        value.push(KMS_VALUE_VERSION);
        for part in parts {
            value.extend_from_slice(part);
        }
        Ok(self.store.write(id, &value)?)
    }

    fn read_versioned(&self, id: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let Some(raw) = self.store.read(id)? else {
            return Ok(None);
        };
        let raw = Zeroizing::new(raw);
        match raw.split_first() {
            Some((&KMS_VALUE_VERSION, payload)) => Ok(Some(Zeroizing::new(payload.to_vec()))),
            Some((&version, _)) => Err(StorageError::unsupported_version(id, version).into()),
            None => Err(StorageError::corrupted(id, "empty key record").into()),
        }
    }
}

fn private_key_id(public_key: &AgreementPublicKey) -> String {
    format!("{}{}", PRIVATE_PREFIX, public_key.to_hex())
}

fn agreement_id(topic: &Topic) -> String {
    format!("{}{}", AGREEMENT_PREFIX, topic)
}

fn public_key_id(topic: &Topic) -> String {
    format!("{}{}", PUBLIC_PREFIX, topic)
}
