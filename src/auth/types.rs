//! Credential types
//!
//! A [`Credential`] is the single authentication strategy chosen for a
//! connection. It is immutable once resolved and shared read-only by every
//! request on that connection.

use super::certificate::ClientCertificate;
use super::cli::CliTokenSource;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Tokens are refreshed this long before they expire
const REFRESH_BUFFER_SECS: i64 = 300;

/// The authentication strategy for a connection
#[derive(Clone)]
pub enum Credential {
    /// Service principal with a client secret
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
    },

    /// Service principal with a certificate
    ClientCertificate {
        tenant_id: String,
        client_id: String,
        certificate: Arc<ClientCertificate>,
    },

    /// Managed identity of the host; `client_id` selects a user-assigned identity
    ManagedIdentity { client_id: Option<String> },

    /// Token from an already signed-in Azure CLI session
    AzureCli { source: Arc<dyn CliTokenSource> },
}

impl Credential {
    /// The strategy of this credential
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::ClientSecret { .. } => CredentialKind::ClientSecret,
            Self::ClientCertificate { .. } => CredentialKind::ClientCertificate,
            Self::ManagedIdentity { .. } => CredentialKind::ManagedIdentity,
            Self::AzureCli { .. } => CredentialKind::AzureCli,
        }
    }

    /// Tenant the credential is bound to, if known up front
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Self::ClientSecret { tenant_id, .. } | Self::ClientCertificate { tenant_id, .. } => {
                Some(tenant_id)
            }
            Self::ManagedIdentity { .. } | Self::AzureCli { .. } => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            Self::ClientCertificate {
                tenant_id,
                client_id,
                certificate,
            } => f
                .debug_struct("ClientCertificate")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("thumbprint", &certificate.thumbprint())
                .finish(),
            Self::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            Self::AzureCli { source } => f
                .debug_struct("AzureCli")
                .field("source", &source.name())
                .finish(),
        }
    }
}

/// Credential strategies in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ClientSecret,
    ClientCertificate,
    ManagedIdentity,
    AzureCli,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClientSecret => "client_secret",
            Self::ClientCertificate => "client_certificate",
            Self::ManagedIdentity => "managed_identity",
            Self::AzureCli => "azure_cli",
        };
        write!(f, "{name}")
    }
}

/// Cached access token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired or inside the refresh window
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(REFRESH_BUFFER_SECS);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_cached_token_not_expired() {
        let token = CachedToken::expires_in("test".to_string(), 3600);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_cached_token_inside_refresh_window() {
        let token = CachedToken::expires_in("test".to_string(), 60);
        assert!(token.is_expired());
    }

    #[test]
    fn test_cached_token_no_expiration() {
        let token = CachedToken::new("test".to_string(), None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let credential = Credential::ClientSecret {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: SecretString::new("hunter2".to_string()),
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("tenant"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(credential.kind(), CredentialKind::ClientSecret);
        assert_eq!(credential.tenant_id(), Some("tenant"));
    }

    #[test]
    fn test_credential_kind_display() {
        assert_eq!(CredentialKind::ManagedIdentity.to_string(), "managed_identity");
        assert_eq!(CredentialKind::AzureCli.to_string(), "azure_cli");
    }
}
