//! Configuration shared by the main process and the notification extension.
//!
//! Both processes must agree on `group_identifier`: it names the shared
//! storage namespace that holds key material and subscriptions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PushkitError, Result};

/// Default shared storage namespace.
pub const DEFAULT_GROUP_IDENTIFIER: &str = "group.com.pushkit.sdk";

/// Registration gateway settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Push registration server (e.g., "https://echo.walletconnect.com").
    #[serde(default = "default_echo_url")]
    pub base_url: String,

    /// Project the device token is registered under.
    #[serde(default)]
    pub project_id: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Allow plain `http://` URLs. Only meant for local test servers.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_echo_url() -> String {
    "https://echo.walletconnect.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            base_url: default_echo_url(),
            project_id: String::new(),
            timeout_secs: default_timeout(),
            allow_insecure_http: false,
        }
    }
}

impl EchoConfig {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Permit `http://` base URLs.
    pub fn allow_insecure_http(mut self) -> Self {
        self.allow_insecure_http = true;
        self
    }

    /// Check the URL scheme and project id.
    pub fn validate(&self) -> Result<()> {
        check_url("echo.base_url", &self.base_url, self.allow_insecure_http)?;
        if self.project_id.trim().is_empty() {
            return Err(PushkitError::ValidationFailed(
                "echo.project_id must not be empty".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(PushkitError::ValidationFailed(
                "echo.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Notification extension settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Time budget for one notification in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Whether to attempt optional enrichment (icon download) after the
    /// minimal content is ready.
    #[serde(default = "default_enrich")]
    pub enrich_content: bool,
}

fn default_deadline_ms() -> u64 {
    25_000
}

fn default_enrich() -> bool {
    true
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            enrich_content: default_enrich(),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushkitConfig {
    /// Shared storage namespace.
    #[serde(default = "default_group_identifier")]
    pub group_identifier: String,

    /// Keyserver advertised in subscription authorizations.
    #[serde(default = "default_keyserver_url")]
    pub keyserver_url: String,

    #[serde(default)]
    pub echo: EchoConfig,

    #[serde(default)]
    pub extension: ExtensionConfig,

    /// Root directory of the file store. Hosts usually point this at the
    /// application group container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
}

fn default_group_identifier() -> String {
    DEFAULT_GROUP_IDENTIFIER.to_string()
}

fn default_keyserver_url() -> String {
    "https://keys.walletconnect.com".to_string()
}

impl Default for PushkitConfig {
    fn default() -> Self {
        Self {
            group_identifier: default_group_identifier(),
            keyserver_url: default_keyserver_url(),
            echo: EchoConfig::default(),
            extension: ExtensionConfig::default(),
            storage_root: None,
        }
    }
}

impl PushkitConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Set the shared storage namespace.
    pub fn with_group_identifier(mut self, group_identifier: impl Into<String>) -> Self {
        self.group_identifier = group_identifier.into();
        self
    }

    /// Set the keyserver URL.
    pub fn with_keyserver_url(mut self, url: impl Into<String>) -> Self {
        self.keyserver_url = url.into();
        self
    }

    /// Set the registration gateway config.
    pub fn with_echo(mut self, echo: EchoConfig) -> Self {
        self.echo = echo;
        self
    }

    /// Set the storage root.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Validate everything except the registration gateway, which is only
    /// checked by [`EchoConfig::validate`] when registration is used.
    pub fn validate(&self) -> Result<()> {
        if self.group_identifier.trim().is_empty() {
            return Err(PushkitError::ValidationFailed(
                "group_identifier must not be empty".into(),
            ));
        }
        check_url("keyserver_url", &self.keyserver_url, false)?;
        if self.extension.deadline_ms == 0 {
            return Err(PushkitError::ValidationFailed(
                "extension.deadline_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn check_url(field: &str, url: &str, allow_http: bool) -> Result<()> {
    if url.starts_with("https://") || (allow_http && url.starts_with("http://")) {
        Ok(())
    } else {
        Err(PushkitError::invalid_data(
            field,
            format!("'{}' must use https", url),
        ))
    }
}
