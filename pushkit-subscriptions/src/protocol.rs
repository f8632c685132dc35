//! Relay methods and tags used by the push protocol.
//!
//! Every relay publish carries a numeric tag so the push backend (and the
//! notification extension) can tell message kinds apart without decrypting.

/// A request method and the tags of its request and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolMethod {
    pub method: &'static str,
    pub request_tag: u32,
    pub response_tag: u32,
}

/// Subscription proposal from a dapp to a wallet.
pub const PUSH_REQUEST: ProtocolMethod = ProtocolMethod {
    method: "wc_pushRequest",
    request_tag: 4000,
    response_tag: 4001,
};

/// A notification on an active subscription topic.
pub const PUSH_MESSAGE: ProtocolMethod = ProtocolMethod {
    method: "wc_pushMessage",
    request_tag: 4002,
    response_tag: 4003,
};

/// Subscription deletion, sent by either side.
pub const PUSH_DELETE: ProtocolMethod = ProtocolMethod {
    method: "wc_pushDelete",
    request_tag: 4004,
    response_tag: 4005,
};

/// Look up a method by name.
pub fn by_method(method: &str) -> Option<ProtocolMethod> {
    [PUSH_REQUEST, PUSH_MESSAGE, PUSH_DELETE]
        .into_iter()
        .find(|m| m.method == method)
}
