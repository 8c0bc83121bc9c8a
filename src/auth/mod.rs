//! Authentication module
//!
//! Supports: client secret, client certificate, managed identity, Azure CLI
//!
//! The [`CredentialResolver`] picks one strategy per connection from the
//! merged config, and the [`Authenticator`] turns it into cached bearer
//! tokens for Microsoft Graph.

mod authenticator;
mod certificate;
mod cli;
mod resolver;
mod types;

pub use authenticator::{Authenticator, TokenEndpoints, IMDS_ENDPOINT};
pub use certificate::ClientCertificate;
pub use cli::{parse_cli_output, AzureCli, CliTokenSource};
pub use resolver::CredentialResolver;
pub use types::{CachedToken, Credential, CredentialKind};
