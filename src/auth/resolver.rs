//! Credential resolution
//!
//! Chooses exactly one strategy from the merged connection config. Rules are
//! checked in order and the first match wins:
//!
//! | tenant | client_id | secret | cert path | msi   | strategy          |
//! |--------|-----------|--------|-----------|-------|-------------------|
//! | set    | set       | set    | any       | any   | client secret     |
//! | set    | set       | unset  | set       | any   | client certificate|
//! | any    | any       | any    | any       | true  | managed identity  |
//! | unset  | any       | any    | any       | other | Azure CLI         |

use super::certificate::ClientCertificate;
use super::cli::{AzureCli, CliTokenSource};
use super::types::{Credential, CredentialKind};
use crate::config::{ConnectionConfig, Environment};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;

type Matcher = fn(&ConnectionConfig) -> bool;
type Builder = fn(&CredentialResolver, &ConnectionConfig) -> Result<Credential>;

struct Rule {
    kind: CredentialKind,
    matches: Matcher,
    build: Builder,
}

const RULES: [Rule; 4] = [
    Rule {
        kind: CredentialKind::ClientSecret,
        matches: |c| c.tenant_id.is_some() && c.client_id.is_some() && c.client_secret.is_some(),
        build: CredentialResolver::client_secret,
    },
    Rule {
        kind: CredentialKind::ClientCertificate,
        matches: |c| {
            c.tenant_id.is_some() && c.client_id.is_some() && c.certificate_path.is_some()
        },
        build: CredentialResolver::client_certificate,
    },
    Rule {
        kind: CredentialKind::ManagedIdentity,
        matches: |c| c.enable_msi == Some(true),
        build: CredentialResolver::managed_identity,
    },
    Rule {
        kind: CredentialKind::AzureCli,
        matches: |c| c.tenant_id.is_none(),
        build: CredentialResolver::azure_cli,
    },
];

/// Picks and builds the credential for a connection
pub struct CredentialResolver {
    cli: Arc<dyn CliTokenSource>,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver {
    /// Resolver that uses the installed Azure CLI as the fallback
    pub fn new() -> Self {
        Self {
            cli: Arc::new(AzureCli::new()),
        }
    }

    /// Resolver with a custom CLI token source
    pub fn with_cli_source(cli: Arc<dyn CliTokenSource>) -> Self {
        Self { cli }
    }

    /// Merge the environment into `config` and resolve a credential
    pub fn resolve(&self, config: &ConnectionConfig, env: &dyn Environment) -> Result<Credential> {
        let merged = config.clone().with_environment(env);
        self.resolve_config(&merged)
    }

    /// Resolve a credential from an already merged config
    pub fn resolve_config(&self, config: &ConnectionConfig) -> Result<Credential> {
        match RULES.iter().find(|rule| (rule.matches)(config)) {
            Some(rule) => {
                debug!(strategy = %rule.kind, "Selected credential strategy");
                (rule.build)(self, config)
            }
            None => Err(incomplete(config)),
        }
    }

    /// Which strategy `config` selects, without building it
    pub fn select(config: &ConnectionConfig) -> Option<CredentialKind> {
        RULES
            .iter()
            .find(|rule| (rule.matches)(config))
            .map(|rule| rule.kind)
    }

    fn client_secret(&self, config: &ConnectionConfig) -> Result<Credential> {
        let (tenant_id, client_id) = service_principal(config)?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| Error::missing_field("client_secret"))?;
        Ok(Credential::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        })
    }

    fn client_certificate(&self, config: &ConnectionConfig) -> Result<Credential> {
        let (tenant_id, client_id) = service_principal(config)?;
        let path = config
            .certificate_path
            .as_deref()
            .ok_or_else(|| Error::missing_field("certificate_path"))?;
        let certificate = ClientCertificate::load(path, config.certificate_password.as_ref())?;
        debug!(
            subject = certificate.subject(),
            thumbprint = certificate.thumbprint(),
            "Loaded client certificate"
        );
        Ok(Credential::ClientCertificate {
            tenant_id,
            client_id,
            certificate: Arc::new(certificate),
        })
    }

    fn managed_identity(&self, config: &ConnectionConfig) -> Result<Credential> {
        Ok(Credential::ManagedIdentity {
            client_id: config.client_id.clone(),
        })
    }

    fn azure_cli(&self, _config: &ConnectionConfig) -> Result<Credential> {
        self.cli.ensure_available()?;
        Ok(Credential::AzureCli {
            source: Arc::clone(&self.cli),
        })
    }
}

fn service_principal(config: &ConnectionConfig) -> Result<(String, String)> {
    let tenant_id = config
        .tenant_id
        .clone()
        .ok_or_else(|| Error::missing_field("tenant_id"))?;
    let client_id = config
        .client_id
        .clone()
        .ok_or_else(|| Error::missing_field("client_id"))?;
    Ok((tenant_id, client_id))
}

/// Error for a config that names a tenant but no usable credential
fn incomplete(config: &ConnectionConfig) -> Error {
    if config.client_id.is_none() {
        return Error::missing_field("client_id");
    }
    Error::config(
        "tenant_id and client_id are set but neither client_secret nor certificate_path is; \
         set one of them, enable managed identity, or clear tenant_id to use the Azure CLI",
    )
}
