//! JSON-RPC 2.0 message types carried inside envelopes.

use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier.
///
/// Generated as `unix_millis * 1000 + random(0..1000)` so ids are roughly
/// time ordered and collide only within the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcId(i64);

impl RpcId {
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let entropy: i64 = rand::thread_rng().gen_range(0..1000);
        Self(millis * 1000 + entropy)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RpcId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Build a request with a fresh id.
    pub fn new(method: impl Into<String>, params: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RpcId::generate(),
            method: method.into(),
            params: Some(serde_json::to_value(params)?),
        })
    }

    pub fn with_id(mut self, id: RpcId) -> Self {
        self.id = id;
        self
    }

    /// Decode the params. `None` when the request carries no params.
    pub fn params_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Either side of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcOutcome {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(RpcError),
}

/// A JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn result(id: RpcId, result: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: RpcOutcome::Result(serde_json::to_value(result)?),
        })
    }

    pub fn error(id: RpcId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: RpcOutcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, RpcOutcome::Error(_))
    }

    /// Decode the success payload. `None` for error responses.
    pub fn result_as<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        match &self.outcome {
            RpcOutcome::Result(value) => Some(serde_json::from_value(value.clone())),
            RpcOutcome::Error(_) => None,
        }
    }
}

/// Any JSON-RPC message, as decoded from an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcMessage {
    Request(RpcRequest),
    Response(RpcResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::new("wc_pushRequest", json!({"publicKey": "ab"}))
            .unwrap()
            .with_id(RpcId::from(42));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 42, "method": "wc_pushRequest", "params": {"publicKey": "ab"}})
        );
    }

    #[test]
    fn test_response_result_and_error_shapes() {
        let ok = RpcResponse::result(RpcId::from(1), json!({"subscriptionAuth": "jwt"})).unwrap();
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": {"subscriptionAuth": "jwt"}})
        );

        let err = RpcResponse::error(RpcId::from(2), RpcError::new(5000, "User rejected"));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"]["code"], 5000);
        assert!(err.is_error());
        assert!(err.result_as::<Value>().is_none());
    }

    #[test]
    fn test_message_discrimination() {
        let raw = r#"{"jsonrpc":"2.0","id":7,"result":true}"#;
        assert!(matches!(
            serde_json::from_str::<RpcMessage>(raw).unwrap(),
            RpcMessage::Response(_)
        ));

        let raw = r#"{"jsonrpc":"2.0","id":7,"method":"wc_pushDelete","params":{}}"#;
        assert!(matches!(
            serde_json::from_str::<RpcMessage>(raw).unwrap(),
            RpcMessage::Request(_)
        ));
    }

    #[test]
    fn test_generated_ids_are_time_ordered() {
        let a = RpcId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = RpcId::generate();
        assert!(b > a);
    }
}
