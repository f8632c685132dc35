//! Relay tag dispatch.
//!
//! The push backend forwards the relay tag of every message. The tag alone
//! decides which sub-protocol parses the payload; unknown tags are left to
//! the host untouched.

use std::collections::HashMap;

/// Sub-protocols the extension can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubProtocol {
    /// `wc_pushMessage` notifications.
    Notify,
    /// Wallet session and auth requests.
    Web3Wallet,
}

/// Tags of `wc_pushMessage` requests.
pub const NOTIFY_TAGS: &[u32] = &[4002];

/// Tags of `wc_sessionPropose`, `wc_sessionRequest` and `wc_authRequest`.
pub const WEB3WALLET_TAGS: &[u32] = &[1100, 1108, 3000];

/// Lookup table from relay tag to sub-protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    entries: HashMap<u32, SubProtocol>,
}

impl TagTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Route `tags` to `protocol`, replacing earlier routes for them.
    pub fn with(mut self, protocol: SubProtocol, tags: &[u32]) -> Self {
        for tag in tags {
            self.entries.insert(*tag, protocol);
        }
        self
    }

    pub fn lookup(&self, tag: u32) -> Option<SubProtocol> {
        self.entries.get(&tag).copied()
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::empty()
            .with(SubProtocol::Notify, NOTIFY_TAGS)
            .with(SubProtocol::Web3Wallet, WEB3WALLET_TAGS)
    }
}
