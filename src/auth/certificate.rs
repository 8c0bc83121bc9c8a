//! Client certificate credentials
//!
//! Loads a PEM bundle (certificate chain plus RSA private key, optionally
//! encrypted as PKCS#8) and signs the client assertion JWT used for the
//! certificate grant.

use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Lifetime of a signed client assertion
const ASSERTION_LIFETIME_SECS: i64 = 600;

/// A parsed client certificate with its signing key
pub struct ClientCertificate {
    /// DER certificates, leaf first
    chain: Vec<Vec<u8>>,
    /// Base64url SHA-1 thumbprint of the leaf (`x5t`)
    thumbprint: String,
    /// Subject of the leaf certificate
    subject: String,
    /// Expiry of the leaf certificate
    not_after: Option<DateTime<Utc>>,
    key: EncodingKey,
}

impl ClientCertificate {
    /// Load a PEM bundle from disk
    pub fn load(path: &Path, password: Option<&SecretString>) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::credential(format!(
                "Failed to read certificate '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&bytes, password)
    }

    /// Parse a PEM bundle
    ///
    /// The bundle must hold at least one `CERTIFICATE` block and an RSA
    /// private key (`PRIVATE KEY`, `RSA PRIVATE KEY` or
    /// `ENCRYPTED PRIVATE KEY`). The first certificate is the leaf.
    pub fn from_pem(bytes: &[u8], password: Option<&SecretString>) -> Result<Self> {
        let blocks = pem::parse_many(bytes)
            .map_err(|e| Error::credential(format!(
                "Invalid PEM certificate bundle (PKCS#12 is not supported): {e}"
            )))?;

        if blocks.is_empty() {
            return Err(Error::credential(
                "Certificate file contains no PEM blocks; PKCS#12 (.pfx) bundles must be converted to PEM",
            ));
        }

        let mut chain = Vec::new();
        let mut key = None;

        for block in &blocks {
            match block.tag() {
                "CERTIFICATE" => chain.push(block.contents().to_vec()),
                "PRIVATE KEY" => {
                    let parsed = RsaPrivateKey::from_pkcs8_der(block.contents())
                        .map_err(|e| Error::credential(format!("Invalid RSA private key: {e}")))?;
                    key = Some(signing_key(&parsed)?);
                }
                "RSA PRIVATE KEY" => {
                    let parsed = RsaPrivateKey::from_pkcs1_der(block.contents())
                        .map_err(|e| Error::credential(format!("Invalid RSA private key: {e}")))?;
                    key = Some(signing_key(&parsed)?);
                }
                "ENCRYPTED PRIVATE KEY" => {
                    let password = password.ok_or_else(|| {
                        Error::credential(
                            "Private key is encrypted but no certificate password was provided",
                        )
                    })?;
                    let parsed = RsaPrivateKey::from_pkcs8_encrypted_der(
                        block.contents(),
                        password.expose_secret().as_bytes(),
                    )
                    .map_err(|e| Error::credential(format!("Failed to decrypt private key: {e}")))?;
                    key = Some(signing_key(&parsed)?);
                }
                other => {
                    return Err(Error::credential(format!(
                        "Unsupported PEM block '{other}' in certificate bundle"
                    )));
                }
            }
        }

        let key = key.ok_or_else(|| Error::credential("Certificate bundle has no private key"))?;
        let leaf = chain
            .first()
            .ok_or_else(|| Error::credential("Certificate bundle has no certificate"))?;

        let (_, parsed) = x509_parser::parse_x509_certificate(leaf)
            .map_err(|e| Error::credential(format!("Invalid X.509 certificate: {e}")))?;
        let subject = parsed.subject().to_string();
        let not_after = DateTime::from_timestamp(parsed.validity().not_after.timestamp(), 0);

        let thumbprint = URL_SAFE_NO_PAD.encode(Sha1::digest(leaf));

        Ok(Self {
            chain,
            thumbprint,
            subject,
            not_after,
            key,
        })
    }

    /// `x5t` thumbprint of the leaf certificate
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// Subject of the leaf certificate
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Expiry of the leaf certificate
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Number of certificates in the chain
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Sign a client assertion for the given application and token endpoint
    pub fn client_assertion(&self, client_id: &str, token_url: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            aud: token_url,
            iss: client_id,
            sub: client_id,
            jti: Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.x5t = Some(self.thumbprint.clone());

        encode(&header, &claims, &self.key)
            .map_err(|e| Error::credential(format!("Failed to sign client assertion: {e}")))
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("subject", &self.subject)
            .field("thumbprint", &self.thumbprint)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    iat: i64,
    exp: i64,
}

/// PKCS#1 DER is the form the RS256 signer takes
fn signing_key(key: &RsaPrivateKey) -> Result<EncodingKey> {
    let der = key
        .to_pkcs1_der()
        .map_err(|e| Error::credential(format!("Failed to encode private key: {e}")))?;
    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}
