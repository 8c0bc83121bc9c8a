//! Azure CLI token source
//!
//! Runs `az account get-access-token` for a signed-in CLI session. The
//! executable is only looked up in a fixed set of install directories and is
//! started with a cleared environment, so a hostile `PATH` entry cannot
//! shadow it.

use super::types::CachedToken;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[cfg(windows)]
const EXECUTABLE: &str = "az.cmd";
#[cfg(not(windows))]
const EXECUTABLE: &str = "az";

/// Variables passed through to the CLI process
const PASSTHROUGH_VARS: &[&str] = &[
    "HOME",
    "AZURE_CONFIG_DIR",
    "USERPROFILE",
    "SYSTEMROOT",
    "LOCALAPPDATA",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can hand out tokens from a CLI login
#[async_trait]
pub trait CliTokenSource: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Fail fast when the CLI cannot be used at all
    fn ensure_available(&self) -> Result<()>;

    /// Get a token for the given resource
    async fn get_token(&self, resource: &str) -> Result<CachedToken>;
}

/// The installed Azure CLI
#[derive(Debug, Clone)]
pub struct AzureCli {
    search_path: Vec<PathBuf>,
    passthrough: Vec<(String, String)>,
    timeout: Duration,
}

impl Default for AzureCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCli {
    /// Look in the standard install locations
    pub fn new() -> Self {
        let passthrough = PASSTHROUGH_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| ((*key).to_string(), v)))
            .collect();
        Self {
            search_path: default_search_path(),
            passthrough,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the directories searched for the executable
    #[must_use]
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = dirs;
        self
    }

    /// Set the process timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Find the executable in the search path
    pub fn locate(&self) -> Result<PathBuf> {
        self.search_path
            .iter()
            .map(|dir| dir.join(EXECUTABLE))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                Error::credential(format!(
                    "Azure CLI not found in {}; install it or configure another credential",
                    self.search_path
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    fn restricted_path(&self) -> Result<OsString> {
        std::env::join_paths(&self.search_path)
            .map_err(|e| Error::credential(format!("Invalid Azure CLI search path: {e}")))
    }
}

#[async_trait]
impl CliTokenSource for AzureCli {
    fn name(&self) -> &str {
        "azure-cli"
    }

    fn ensure_available(&self) -> Result<()> {
        self.locate().map(|_| ())
    }

    async fn get_token(&self, resource: &str) -> Result<CachedToken> {
        let program = self.locate()?;
        debug!(program = %program.display(), resource, "Requesting token from Azure CLI");

        let mut command = Command::new(&program);
        command
            .args(["account", "get-access-token", "--output", "json", "--resource", resource])
            .env_clear()
            .env("PATH", self.restricted_path()?)
            .envs(self.passthrough.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::credential(format!(
                    "Azure CLI did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::credential(format!("Failed to run Azure CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::credential(format!(
                "Azure CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_cli_output(&output.stdout)
    }
}

#[cfg(windows)]
fn default_search_path() -> Vec<PathBuf> {
    ["ProgramFiles(x86)", "ProgramFiles"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|root| {
            PathBuf::from(root)
                .join("Microsoft SDKs")
                .join("Azure")
                .join("CLI2")
                .join("wbin")
        })
        .collect()
}

#[cfg(not(windows))]
fn default_search_path() -> Vec<PathBuf> {
    ["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

#[derive(Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    /// Unix seconds, newer CLI versions
    #[serde(default)]
    expires_on: Option<Value>,
    /// Local time `YYYY-MM-DD HH:MM:SS.ffffff`
    #[serde(rename = "expiresOn", default)]
    expires_on_local: Option<String>,
}

/// Parse the JSON printed by `az account get-access-token`
pub fn parse_cli_output(stdout: &[u8]) -> Result<CachedToken> {
    let parsed: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| Error::credential(format!("Malformed Azure CLI output: {e}")))?;

    let token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::credential("Azure CLI output has no accessToken"))?;

    let expires_at = parsed
        .expires_on
        .as_ref()
        .and_then(unix_seconds)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| parsed.expires_on_local.as_deref().and_then(parse_local_time))
        .ok_or_else(|| Error::credential("Azure CLI output has no usable expiry"))?;

    Ok(CachedToken::new(token, Some(expires_at)))
}

fn unix_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_local_time(text: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
