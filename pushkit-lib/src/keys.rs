//! X25519 key agreement.
//!
//! Both sides of a handshake hold an ephemeral X25519 key pair. The symmetric
//! key for a topic is `HKDF-SHA256(X25519(own_private, peer_public))`, 32
//! bytes, no salt, empty info. The agreement is commutative, so the dapp and
//! the wallet derive the same key and therefore the same subscription topic.
//!
//! Nothing in this module touches storage. Persisting keys is the job of
//! [`crate::kms::KeyManagementService`].

use std::fmt;
use std::str::FromStr;

use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::topic::Topic;

/// Length of every key handled here.
pub const KEY_LENGTH: usize = 32;

/// Key agreement errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgreementError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Key agreement produced a non-contributory shared secret")]
    NonContributory,
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

/// An X25519 public key.
///
/// Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgreementPublicKey([u8; KEY_LENGTH]);

impl AgreementPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice, enforcing the key length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AgreementError> {
        let raw: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            AgreementError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, AgreementError> {
        let bytes = hex::decode(s).map_err(|e| AgreementError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AgreementPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AgreementPublicKey")
            .field(&self.to_hex())
            .finish()
    }
}

impl fmt::Display for AgreementPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for AgreementPublicKey {
    type Err = AgreementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for AgreementPublicKey {
    type Error = AgreementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<AgreementPublicKey> for String {
    fn from(key: AgreementPublicKey) -> Self {
        key.to_hex()
    }
}

/// An X25519 private key. Zeroized on drop, never printed.
pub struct AgreementPrivateKey(StaticSecret);

impl AgreementPrivateKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Raw key bytes, for persisting through the KMS.
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> AgreementPublicKey {
        AgreementPublicKey(*PublicKey::from(&self.0).as_bytes())
    }
}

impl fmt::Debug for AgreementPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AgreementPrivateKey([REDACTED])")
    }
}

/// A 32-byte symmetric key for a topic.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LENGTH]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; KEY_LENGTH] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    /// Random key, used for pairing topics.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// The subscription topic for this key: `hex(sha256(key))`.
    pub fn derived_topic(&self) -> Topic {
        Topic::from_key_material(&self.0)
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Result of a key agreement: the shared key plus the local public key the
/// peer needs to compute the same secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgreementKeys {
    pub shared_key: SymmetricKey,
    pub public_key: AgreementPublicKey,
}

impl AgreementKeys {
    /// Subscription topic derived from the shared key.
    pub fn derived_topic(&self) -> Topic {
        self.shared_key.derived_topic()
    }
}

/// Combine a local private key with a peer public key.
///
/// Fails with [`AgreementError::NonContributory`] for low-order peer points,
/// which would otherwise yield an all-zero secret.
pub fn perform_key_agreement(
    private_key: &AgreementPrivateKey,
    peer_public_key: &AgreementPublicKey,
) -> Result<AgreementKeys, AgreementError> {
    let shared = private_key
        .0
        .diffie_hellman(&PublicKey::from(peer_public_key.0));
    if !shared.was_contributory() {
        return Err(AgreementError::NonContributory);
    }

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; KEY_LENGTH];
    hk.expand(&[], &mut okm)
        .map_err(|e| AgreementError::KeyDerivation(e.to_string()))?;

    let keys = AgreementKeys {
        shared_key: SymmetricKey(okm),
        public_key: private_key.public_key(),
    };
    okm.zeroize();
    Ok(keys)
}

/// Generate a fresh local key pair and agree with `peer_public_key`.
///
/// The private key is returned by value so the caller can either persist it
/// once (through the KMS) or let it drop, which zeroizes it.
pub fn generate_agreement_keys(
    peer_public_key: &AgreementPublicKey,
) -> Result<(AgreementKeys, AgreementPrivateKey), AgreementError> {
    let private_key = AgreementPrivateKey::generate();
    let keys = perform_key_agreement(&private_key, peer_public_key)?;
    Ok((keys, private_key))
}
