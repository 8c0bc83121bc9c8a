//! Authenticator implementation
//!
//! Acquires Graph access tokens for a resolved [`Credential`] and keeps the
//! current one cached until it enters the refresh window.

use super::types::{CachedToken, Credential};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Instance metadata service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Where tokens come from and what they are for
#[derive(Debug, Clone)]
pub struct TokenEndpoints {
    /// Login authority host, no trailing slash
    pub authority_host: String,
    /// Graph base URL; the token resource
    pub resource: String,
    /// Managed identity endpoint override
    pub msi_endpoint: Option<String>,
    /// Managed identity header secret (App Service style endpoints)
    pub msi_header: Option<SecretString>,
}

impl TokenEndpoints {
    /// Endpoints for a merged connection config
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            authority_host: config.authority_host(),
            resource: config.graph_endpoint(),
            msi_endpoint: config.endpoints.msi_endpoint.clone(),
            msi_header: config.endpoints.msi_header.clone(),
        }
    }

    /// OAuth2 token URL for a tenant
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{tenant_id}/oauth2/v2.0/token", self.authority_host)
    }

    /// Client-credentials scope
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource)
    }
}

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    credential: Credential,
    endpoints: TokenEndpoints,
    /// Cached bearer token
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(credential: Credential, endpoints: TokenEndpoints) -> Self {
        Self::with_client(credential, endpoints, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(credential: Credential, endpoints: TokenEndpoints, http_client: Client) -> Self {
        Self {
            credential,
            endpoints,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token().await?;
        Ok(req.bearer_auth(token))
    }

    /// Get a valid token, refreshing if necessary
    pub async fn token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    #[instrument(skip(self), fields(credential = %self.credential.kind()))]
    async fn fetch_new_token(&self) -> Result<CachedToken> {
        let scope = self.endpoints.scope();
        let token = match &self.credential {
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.expose_secret().as_str()),
                    ("scope", scope.as_str()),
                ];
                self.post_token_form(&self.endpoints.token_url(tenant_id), &form)
                    .await?
            }

            Credential::ClientCertificate {
                tenant_id,
                client_id,
                certificate,
            } => {
                let token_url = self.endpoints.token_url(tenant_id);
                let assertion = certificate.client_assertion(client_id, &token_url)?;
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                    ("client_assertion", assertion.as_str()),
                    ("scope", scope.as_str()),
                ];
                self.post_token_form(&token_url, &form).await?
            }

            Credential::ManagedIdentity { client_id } => {
                self.fetch_managed_identity(client_id.as_deref()).await?
            }

            Credential::AzureCli { source } => source.get_token(&self.endpoints.resource).await?,
        };

        debug!(expires_at = ?token.expires_at, "Acquired access token");
        Ok(token)
    }

    async fn post_token_form(&self, token_url: &str, form: &[(&str, &str)]) -> Result<CachedToken> {
        let response = self
            .http_client
            .post(token_url)
            .form(form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Token request failed with status {status}: {}",
                token_error_description(&body)
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        token_response.into_cached_token()
    }

    async fn fetch_managed_identity(&self, client_id: Option<&str>) -> Result<CachedToken> {
        let resource = self.endpoints.resource.as_str();
        let request = match (&self.endpoints.msi_endpoint, &self.endpoints.msi_header) {
            (Some(endpoint), Some(header)) => {
                let mut query = vec![("api-version", APP_SERVICE_API_VERSION), ("resource", resource)];
                if let Some(id) = client_id {
                    query.push(("client_id", id));
                }
                self.http_client
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header.expose_secret().as_str())
            }
            (endpoint, _) => {
                let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];
                if let Some(id) = client_id {
                    query.push(("client_id", id));
                }
                self.http_client
                    .get(endpoint.as_deref().unwrap_or(IMDS_ENDPOINT))
                    .query(&query)
                    .header("Metadata", "true")
            }
        };

        let response = request.send().await.map_err(|e| {
            Error::auth(format!("Managed identity endpoint unreachable: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Managed identity token request failed with status {status}: {}",
                token_error_description(&body)
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        token_response.into_cached_token()
    }

    /// Clear the cached token (forces a refresh on the next request)
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// The credential this authenticator uses
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Token endpoints
    pub fn endpoints(&self) -> &TokenEndpoints {
        &self.endpoints
    }
}

/// Token response; managed identity endpoints send numbers as strings
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expires_on: Option<Value>,
}

impl TokenResponse {
    fn into_cached_token(self) -> Result<CachedToken> {
        if self.access_token.is_empty() {
            return Err(Error::auth("Token response has an empty access_token"));
        }
        if let Some(secs) = self.expires_in.as_ref().and_then(as_i64) {
            return Ok(CachedToken::expires_in(self.access_token, secs));
        }
        let expires_at = self
            .expires_on
            .as_ref()
            .and_then(as_i64)
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0));
        Ok(CachedToken::new(self.access_token, expires_at))
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pull `error_description` out of an OAuth error body, else return it trimmed
fn token_error_description(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error_description")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
