//! Registration gateway.
//!
//! Registers a device push token for a project with the push delivery
//! backend ("echo" server), and unregisters it again.
//!
//! # Feature Flags
//!
//! Real HTTP requests need the `http-client` feature (on by default).
//! Without it every request returns an `Unimplemented` error.
//!
//! # Example
//!
//! ```rust,ignore
//! use pushkit_lib::config::EchoConfig;
//! use pushkit_lib::echo::EchoClient;
//!
//! let client = EchoClient::new(EchoConfig::new("https://echo.walletconnect.com", "my-project"))?;
//! client.register("client-id", "apns-device-token").await?;
//! ```

use serde::Serialize;
#[cfg(feature = "http-client")]
use std::time::Duration;

use crate::config::EchoConfig;
#[cfg(feature = "http-client")]
use crate::PushkitError;
use crate::Result;

/// HTTP method of an [`EchoApi`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Delete,
}

/// Body of a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct RegisterBody {
    pub client_id: String,
    #[serde(rename = "type")]
    pub push_type: String,
    pub token: String,
}

/// Calls the gateway understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoApi {
    Register {
        client_id: String,
        token: String,
        project_id: String,
    },
    Unregister {
        client_id: String,
        project_id: String,
    },
}

impl EchoApi {
    pub fn path(&self) -> String {
        match self {
            Self::Register { project_id, .. } => format!("/{}/clients", project_id),
            // No separator between "clients" and the id; the backend routes
            // on this exact path.
            Self::Unregister {
                client_id,
                project_id,
            } => format!("/{}/clients{}", project_id, client_id),
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Register { .. } => HttpMethod::Post,
            Self::Unregister { .. } => HttpMethod::Delete,
        }
    }

    pub fn body(&self) -> Option<RegisterBody> {
        match self {
            Self::Register {
                client_id, token, ..
            } => Some(RegisterBody {
                client_id: client_id.clone(),
                push_type: "apns".to_string(),
                token: token.clone(),
            }),
            Self::Unregister { .. } => None,
        }
    }
}

/// HTTP client for the registration gateway.
pub struct EchoClient {
    config: EchoConfig,
    #[cfg(feature = "http-client")]
    client: reqwest::Client,
}

impl EchoClient {
    /// Create a client. Fails if the config is invalid.
    #[cfg(feature = "http-client")]
    pub fn new(config: EchoConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PushkitError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a client (stub when feature disabled).
    #[cfg(not(feature = "http-client"))]
    pub fn new(config: EchoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &EchoConfig {
        &self.config
    }

    /// Register `token` for `client_id` under the configured project.
    #[tracing::instrument(skip(self, token))]
    pub async fn register(&self, client_id: &str, token: &str) -> Result<()> {
        self.send(EchoApi::Register {
            client_id: client_id.to_string(),
            token: token.to_string(),
            project_id: self.config.project_id.clone(),
        })
        .await
    }

    /// Remove the registration for `client_id`.
    #[tracing::instrument(skip(self))]
    pub async fn unregister(&self, client_id: &str) -> Result<()> {
        self.send(EchoApi::Unregister {
            client_id: client_id.to_string(),
            project_id: self.config.project_id.clone(),
        })
        .await
    }

    #[cfg(any(feature = "http-client", test))]
    fn url(&self, api: &EchoApi) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), api.path())
    }

    #[cfg(feature = "http-client")]
    async fn send(&self, api: EchoApi) -> Result<()> {
        let url = self.url(&api);
        let request = match api.method() {
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        let request = match api.body() {
            Some(body) => request.json(&body),
            None => request,
        };

        let response = request.send().await.map_err(|e| self.map_reqwest_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), path = %api.path(), "echo request rejected");
            return Err(PushkitError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(path = %api.path(), "echo request succeeded");
        Ok(())
    }

    #[cfg(not(feature = "http-client"))]
    async fn send(&self, _api: EchoApi) -> Result<()> {
        Err(crate::PushkitError::Unimplemented(
            "Echo HTTP client - enable the 'http-client' feature",
        ))
    }

    /// Map reqwest errors to PushkitError.
    #[cfg(feature = "http-client")]
    fn map_reqwest_error(&self, e: reqwest::Error) -> PushkitError {
        if e.is_timeout() {
            PushkitError::ConnectionTimeout {
                operation: "echo request".to_string(),
                timeout_ms: self.config.timeout_secs * 1000,
            }
        } else if e.is_connect() {
            PushkitError::ConnectionFailed {
                target: self.config.base_url.clone(),
                reason: e.to_string(),
            }
        } else {
            PushkitError::Transport(format!("echo request failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_shape() {
        let api = EchoApi::Register {
            client_id: "c1".into(),
            token: "t1".into(),
            project_id: "p1".into(),
        };
        assert_eq!(api.path(), "/p1/clients");
        assert_eq!(api.method(), HttpMethod::Post);

        let body = serde_json::to_value(api.body().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"client_id": "c1", "type": "apns", "token": "t1"})
        );
    }

    #[test]
    fn test_unregister_shape() {
        let api = EchoApi::Unregister {
            client_id: "c1".into(),
            project_id: "p1".into(),
        };
        assert_eq!(api.path(), "/p1/clientsc1");
        assert_eq!(api.method(), HttpMethod::Delete);
        assert!(api.body().is_none());
    }

    #[test]
    fn test_client_requires_valid_config() {
        assert!(EchoClient::new(EchoConfig::new("http://echo.example", "p1")).is_err());
        let client = EchoClient::new(EchoConfig::new("https://echo.example/", "p1")).unwrap();
        let api = EchoApi::Register {
            client_id: "c".into(),
            token: "t".into(),
            project_id: "p1".into(),
        };
        assert_eq!(client.url(&api), "https://echo.example/p1/clients");
    }
}
