//! Envelope codec for relay payloads.
//!
//! Payloads are ChaCha20-Poly1305 sealed with the topic's symmetric key and
//! carried base64 encoded.
//!
//! # Wire Format
//!
//! ```text
//! type 0: [0x00][12 bytes nonce][N bytes ciphertext][16 bytes auth tag]
//! type 1: [0x01][32 bytes sender public key][12 bytes nonce][ciphertext+tag]
//! ```
//!
//! Type 1 is used for the first message on a response topic, where the
//! receiver does not yet know the sender's public key and needs it to derive
//! the key that opens the envelope.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::keys::{AgreementPublicKey, SymmetricKey, KEY_LENGTH};

/// Size of the nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

const TYPE_0: u8 = 0;
const TYPE_1: u8 = 1;

/// Codec error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),
    #[error("Envelope too short: {0} bytes")]
    Truncated(usize),
    #[error("Unknown envelope type: {0}")]
    UnknownEnvelopeType(u8),
    #[error("Encryption failed")]
    EncryptFailed,
    #[error("Decryption failed: authentication tag mismatch")]
    DecryptFailed,
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// How an envelope identifies its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    /// The receiver already knows the topic key.
    Type0,
    /// Carries the sender's public key for first-contact agreement.
    Type1 { sender_public_key: AgreementPublicKey },
}

/// A sealed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub envelope_type: EnvelopeType,
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext followed by the authentication tag.
    pub sealed: Vec<u8>,
}

impl Envelope {
    /// Parse the binary wire format.
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        let (&type_byte, rest) = bytes
            .split_first()
            .ok_or(CodecError::Truncated(bytes.len()))?;

        let (envelope_type, rest) = match type_byte {
            TYPE_0 => (EnvelopeType::Type0, rest),
            TYPE_1 => {
                if rest.len() < KEY_LENGTH {
                    return Err(CodecError::Truncated(bytes.len()));
                }
                let (key, rest) = rest.split_at(KEY_LENGTH);
                let sender_public_key = AgreementPublicKey::from_slice(key)
                    .map_err(|_| CodecError::Truncated(bytes.len()))?;
                (EnvelopeType::Type1 { sender_public_key }, rest)
            }
            other => return Err(CodecError::UnknownEnvelopeType(other)),
        };

        if rest.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::Truncated(bytes.len()));
        }
        let (nonce, sealed) = rest.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        Ok(Self {
            envelope_type,
            nonce: nonce_bytes,
            sealed: sealed.to_vec(),
        })
    }

    /// Parse a base64 string as received from the relay or a push payload.
    pub fn from_base64(encoded: &str) -> CodecResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Self::parse(&bytes)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + KEY_LENGTH + NONCE_SIZE + self.sealed.len());
        match &self.envelope_type {
            EnvelopeType::Type0 => out.push(TYPE_0),
            EnvelopeType::Type1 { sender_public_key } => {
                out.push(TYPE_1);
                out.extend_from_slice(sender_public_key.as_bytes());
            }
        }
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.sealed);
        out
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Sender public key for type 1 envelopes.
    pub fn sender_public_key(&self) -> Option<&AgreementPublicKey> {
        match &self.envelope_type {
            EnvelopeType::Type0 => None,
            EnvelopeType::Type1 { sender_public_key } => Some(sender_public_key),
        }
    }
}

/// Seal `plaintext` under `key` with a random nonce.
pub fn seal(
    key: &SymmetricKey,
    plaintext: &[u8],
    envelope_type: EnvelopeType,
) -> CodecResult<Envelope> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CodecError::EncryptFailed)?;

    Ok(Envelope {
        envelope_type,
        nonce,
        sealed,
    })
}

/// Open an envelope. Fails on any tampering with nonce, ciphertext or tag.
pub fn open(key: &SymmetricKey, envelope: &Envelope) -> CodecResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.sealed.as_slice())
        .map_err(|_| CodecError::DecryptFailed)
}

/// Seal and base64 encode.
pub fn encode(
    key: &SymmetricKey,
    plaintext: &[u8],
    envelope_type: EnvelopeType,
) -> CodecResult<String> {
    Ok(seal(key, plaintext, envelope_type)?.to_base64())
}

/// Base64 decode and open.
pub fn decode(key: &SymmetricKey, encoded: &str) -> CodecResult<Vec<u8>> {
    open(key, &Envelope::from_base64(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::AgreementPrivateKey;

    #[test]
    fn test_type0_roundtrip() {
        let key = SymmetricKey::generate();
        let encoded = encode(&key, b"{\"title\":\"Hi\"}", EnvelopeType::Type0).unwrap();
        assert_eq!(decode(&key, &encoded).unwrap(), b"{\"title\":\"Hi\"}");
    }

    #[test]
    fn test_type1_carries_sender_key() {
        let key = SymmetricKey::generate();
        let sender = AgreementPrivateKey::generate().public_key();
        let encoded = encode(
            &key,
            b"hello",
            EnvelopeType::Type1 {
                sender_public_key: sender,
            },
        )
        .unwrap();

        let envelope = Envelope::from_base64(&encoded).unwrap();
        assert_eq!(envelope.sender_public_key(), Some(&sender));
        assert_eq!(open(&key, &envelope).unwrap(), b"hello");
    }

    #[test]
    fn test_wrong_key_fails() {
        let encoded = encode(&SymmetricKey::generate(), b"secret", EnvelopeType::Type0).unwrap();
        let err = decode(&SymmetricKey::generate(), &encoded).unwrap_err();
        assert_eq!(err, CodecError::DecryptFailed);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SymmetricKey::generate();
        let mut envelope = seal(&key, b"secret", EnvelopeType::Type0).unwrap();
        envelope.sealed[0] ^= 0x01;
        assert_eq!(open(&key, &envelope).unwrap_err(), CodecError::DecryptFailed);
    }

    #[test]
    fn test_unknown_type_and_truncation() {
        assert_eq!(
            Envelope::parse(&[7u8; 40]).unwrap_err(),
            CodecError::UnknownEnvelopeType(7)
        );
        assert!(matches!(
            Envelope::parse(&[0u8; 10]),
            Err(CodecError::Truncated(10))
        ));
        assert!(matches!(Envelope::parse(&[]), Err(CodecError::Truncated(0))));
        assert!(matches!(
            Envelope::from_base64("not base64!!"),
            Err(CodecError::InvalidBase64(_))
        ));
    }
}
