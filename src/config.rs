//! Connection configuration
//!
//! Settings are layered: values from an explicit config file (YAML or JSON)
//! win, and every missing credential field falls back to its environment
//! variable.

use crate::error::{Error, Result};
use crate::types::{CloudEnvironment, OptionStringExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names read by [`ConnectionConfig::with_environment`]
pub mod env_vars {
    pub const TENANT_ID: &str = "AZURE_TENANT_ID";
    pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
    pub const CERTIFICATE_PATH: &str = "AZURE_CERTIFICATE_PATH";
    pub const CERTIFICATE_PASSWORD: &str = "AZURE_CERTIFICATE_PASSWORD";
    pub const USE_MSI: &str = "AZURE_USE_MSI";
    pub const ENVIRONMENT: &str = "AZURE_ENVIRONMENT";
    pub const AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
    pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
    pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";
}

// ============================================================================
// Environment source
// ============================================================================

/// Source of environment variables
///
/// Abstracted so tests can supply a fixed map instead of mutating the
/// process environment.
pub trait Environment: Send + Sync {
    /// Look up a variable
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Environment for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| (*v).to_string())
    }
}

// ============================================================================
// Connection Config
// ============================================================================

/// Credential, cloud and HTTP settings for one connection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Directory (tenant) id
    pub tenant_id: Option<String>,

    /// Application (client) id; also selects a user-assigned managed identity
    pub client_id: Option<String>,

    /// Client secret
    pub client_secret: Option<SecretString>,

    /// Path to a PEM bundle holding the certificate chain and private key
    pub certificate_path: Option<PathBuf>,

    /// Password for an encrypted private key
    pub certificate_password: Option<SecretString>,

    /// Use the managed identity of the host
    pub enable_msi: Option<bool>,

    /// Cloud environment name (e.g. `AZUREPUBLICCLOUD`)
    pub environment: Option<String>,

    /// HTTP client settings
    pub http: HttpSettings,

    /// Endpoint overrides
    pub endpoints: EndpointOverrides,
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for throttled or failed requests
    pub max_retries: u32,
    /// Client-side request rate limit (0 disables)
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            requests_per_second: 10,
        }
    }
}

impl HttpSettings {
    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Overrides for cloud endpoints (sovereign clouds, proxies, tests)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    /// Microsoft Graph base URL
    pub graph: Option<String>,
    /// Login authority host
    pub authority_host: Option<String>,
    /// Managed identity token endpoint
    pub msi_endpoint: Option<String>,
    /// Header secret sent to `msi_endpoint` (App Service style)
    pub msi_header: Option<SecretString>,
}

impl ConnectionConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file (YAML or JSON)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a config from YAML (JSON is accepted too)
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill every unset field from the environment
    #[must_use]
    pub fn with_environment(mut self, env: &dyn Environment) -> Self {
        let lookup = |key: &str| env.var(key).none_if_empty();

        self.tenant_id = self.tenant_id.none_if_empty().or_else(|| lookup(env_vars::TENANT_ID));
        self.client_id = self.client_id.none_if_empty().or_else(|| lookup(env_vars::CLIENT_ID));
        self.client_secret = non_empty_secret(self.client_secret.take())
            .or_else(|| lookup(env_vars::CLIENT_SECRET).map(SecretString::new));
        self.certificate_path = self
            .certificate_path
            .take()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| lookup(env_vars::CERTIFICATE_PATH).map(PathBuf::from));
        self.certificate_password = non_empty_secret(self.certificate_password.take())
            .or_else(|| lookup(env_vars::CERTIFICATE_PASSWORD).map(SecretString::new));
        if self.enable_msi.is_none() {
            self.enable_msi = lookup(env_vars::USE_MSI).map(|v| parse_flag(&v));
        }
        self.environment = self
            .environment
            .none_if_empty()
            .or_else(|| lookup(env_vars::ENVIRONMENT));

        let endpoints = &mut self.endpoints;
        endpoints.authority_host = endpoints
            .authority_host
            .take()
            .none_if_empty()
            .or_else(|| lookup(env_vars::AUTHORITY_HOST));
        endpoints.msi_endpoint = endpoints
            .msi_endpoint
            .take()
            .none_if_empty()
            .or_else(|| lookup(env_vars::IDENTITY_ENDPOINT));
        endpoints.msi_header = non_empty_secret(endpoints.msi_header.take())
            .or_else(|| lookup(env_vars::IDENTITY_HEADER).map(SecretString::new));

        self
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value(
                "http.timeout_secs",
                "must be greater than zero",
            ));
        }
        for (field, value) in [
            ("endpoints.graph", &self.endpoints.graph),
            ("endpoints.authority_host", &self.endpoints.authority_host),
            ("endpoints.msi_endpoint", &self.endpoints.msi_endpoint),
        ] {
            if let Some(url) = value {
                url::Url::parse(url)
                    .map_err(|e| Error::invalid_value(field, format!("invalid URL: {e}")))?;
            }
        }
        Ok(())
    }

    /// Resolved cloud environment
    pub fn cloud(&self) -> CloudEnvironment {
        CloudEnvironment::from_name(self.environment.as_deref().unwrap_or_default())
    }

    /// Graph base URL without trailing slash
    pub fn graph_endpoint(&self) -> String {
        self.endpoints
            .graph
            .clone()
            .unwrap_or_else(|| self.cloud().graph_endpoint().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Login authority host without trailing slash
    pub fn authority_host(&self) -> String {
        self.endpoints
            .authority_host
            .clone()
            .unwrap_or_else(|| self.cloud().authority_host().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Builder-style setter for the tenant id
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Builder-style setter for the client id
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Builder-style setter for the client secret
    #[must_use]
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Builder-style setter for the certificate path and password
    #[must_use]
    pub fn certificate(mut self, path: impl Into<PathBuf>, password: Option<&str>) -> Self {
        self.certificate_path = Some(path.into());
        self.certificate_password = password.map(|p| SecretString::new(p.to_string()));
        self
    }

    /// Builder-style setter for the managed identity flag
    #[must_use]
    pub fn enable_msi(mut self, enabled: bool) -> Self {
        self.enable_msi = Some(enabled);
        self
    }

    /// Builder-style setter for the Graph endpoint override
    #[must_use]
    pub fn graph_endpoint_override(mut self, url: impl Into<String>) -> Self {
        self.endpoints.graph = Some(url.into());
        self
    }

    /// Builder-style setter for the authority host override
    #[must_use]
    pub fn authority_host_override(mut self, url: impl Into<String>) -> Self {
        self.endpoints.authority_host = Some(url.into());
        self
    }
}

fn non_empty_secret(secret: Option<SecretString>) -> Option<SecretString> {
    secret.filter(|s| !s.expose_secret().is_empty())
}

/// Parse a boolean-ish flag value
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
