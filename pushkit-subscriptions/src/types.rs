//! Push protocol data types.

use pushkit_lib::rpc::RpcError;
use pushkit_lib::{Account, AppMetadata, Topic};
use serde::{Deserialize, Serialize};

/// Relay protocol options recorded with a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProtocolOptions {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Default for RelayProtocolOptions {
    fn default() -> Self {
        Self {
            protocol: "irn".to_string(),
            data: None,
        }
    }
}

/// An active subscription, the result of a completed handshake.
///
/// Keyed by `topic` in the subscription store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub topic: Topic,
    pub account: Account,
    pub relay: RelayProtocolOptions,
    pub metadata: AppMetadata,
}

/// Params of `wc_pushRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequestParams {
    /// Proposer public key, hex.
    pub public_key: String,
    pub metadata: AppMetadata,
    pub account: Account,
}

/// A notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
}

impl NotifyMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: String::new(),
            url: String::new(),
            message_type: String::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = message_type.into();
        self
    }
}

/// Params of `wc_pushDelete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushDeleteParams {
    pub code: i64,
    pub message: String,
}

impl Default for PushDeleteParams {
    fn default() -> Self {
        Self {
            code: 6000,
            message: "User disconnected".to_string(),
        }
    }
}

/// Payload the wallet signs when accepting a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptSubscriptionPayload {
    pub keyserver: String,
    pub subscription_account: Account,
    pub dapp_url: String,
}

/// Result of an accepted `wc_pushRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAuthWrapper {
    #[serde(rename = "subscriptionAuth")]
    pub subscription_auth: String,
}

/// Structured protocol-level rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The user declined the proposal.
    Rejected,
    /// The counterparty sent some other error.
    Remote { code: i64, message: String },
}

impl PushError {
    pub fn code(&self) -> i64 {
        match self {
            Self::Rejected => 5000,
            Self::Remote { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Rejected => "User rejected",
            Self::Remote { message, .. } => message,
        }
    }
}

impl From<&PushError> for RpcError {
    fn from(err: &PushError) -> Self {
        RpcError::new(err.code(), err.message())
    }
}

impl From<RpcError> for PushError {
    fn from(err: RpcError) -> Self {
        if err.code == PushError::Rejected.code() {
            Self::Rejected
        } else {
            Self::Remote {
                code: err.code,
                message: err.message,
            }
        }
    }
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_request_params_camel_case() {
        let value = json!({
            "publicKey": "ab",
            "metadata": {"name": "Gm", "url": "https://gm.example"},
            "account": "eip155:1:0xabc"
        });
        let params: PushRequestParams = serde_json::from_value(value).unwrap();
        assert_eq!(params.metadata.url, "https://gm.example");
    }

    #[test]
    fn test_push_request_params_rejects_bad_account() {
        let value = json!({
            "publicKey": "ab",
            "metadata": {"name": "Gm", "url": "https://gm.example"},
            "account": 42
        });
        assert!(serde_json::from_value::<PushRequestParams>(value).is_err());
    }

    #[test]
    fn test_notify_message_type_field() {
        let message: NotifyMessage = serde_json::from_str(
            r#"{"title":"Hi","body":"Yo","icon":"","url":"https://x.example","type":"promo"}"#,
        )
        .unwrap();
        assert_eq!(message.message_type, "promo");
        assert_eq!(
            serde_json::to_value(&message).unwrap()["type"],
            json!("promo")
        );
    }

    #[test]
    fn test_push_error_rpc_mapping() {
        let rpc: RpcError = (&PushError::Rejected).into();
        assert_eq!(rpc.code, 5000);
        assert_eq!(PushError::from(rpc), PushError::Rejected);

        let other = PushError::from(RpcError::new(1, "nope"));
        assert_eq!(other.code(), 1);
    }

    #[test]
    fn test_accept_payload_shape() {
        let payload = AcceptSubscriptionPayload {
            keyserver: "https://keys.walletconnect.com".into(),
            subscription_account: "eip155:1:0xabc".parse().unwrap(),
            dapp_url: "https://gm.example".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["subscriptionAccount"], json!("eip155:1:0xabc"));
        assert_eq!(value["dappUrl"], json!("https://gm.example"));
    }
}
