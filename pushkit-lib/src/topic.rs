//! Relay topics.
//!
//! A topic is `hex(sha256(input))`: 64 lowercase hex characters. Two
//! derivations exist and must never be swapped:
//!
//! - response topic: hash of the proposer's public key
//! - subscription topic: hash of the agreed symmetric key
//!
//! The main process and the notification extension compute topics
//! independently, so derivation is a pure function of its input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::{AgreementPublicKey, SymmetricKey};

/// Length of a topic string.
pub const TOPIC_LENGTH: usize = 64;

/// A string that is not a valid topic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid topic '{0}': expected 64 lowercase hex characters")]
pub struct InvalidTopic(pub String);

/// A relay topic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Validate and wrap a topic string.
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidTopic> {
        let value = value.into();
        let valid = value.len() == TOPIC_LENGTH
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value))
        } else {
            Err(InvalidTopic(value))
        }
    }

    /// `hex(sha256(bytes))`.
    pub fn from_key_material(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Topic on which the responder answers a proposal made with
    /// `proposer_public_key`.
    pub fn response_topic(proposer_public_key: &AgreementPublicKey) -> Self {
        Self::from_key_material(proposer_public_key.as_bytes())
    }

    /// A fresh random topic, as used for pairings.
    pub fn generate() -> Self {
        SymmetricKey::generate().derived_topic()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = InvalidTopic;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
