//! Common types used throughout entra-tables
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A flattened row keyed by column name
pub type Row = JsonObject;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// Cloud Environment
// ============================================================================

/// Azure cloud the tenant lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudEnvironment {
    /// Azure public cloud
    #[default]
    Public,
    /// Azure US Government cloud
    UsGovernment,
    /// Azure China cloud (21Vianet)
    China,
}

impl CloudEnvironment {
    /// Map an environment name to a cloud.
    ///
    /// Accepts the SDK names (`AZUREPUBLICCLOUD`, `AZUREUSGOVERNMENTCLOUD`,
    /// `AZURECHINACLOUD`) and short forms, case-insensitively. Anything else
    /// falls back to the public cloud.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "azurepubliccloud" | "public" | "azurecloud" => Self::Public,
            "azureusgovernmentcloud" | "azureusgovernment" | "usgovernment" | "usgov" => {
                Self::UsGovernment
            }
            "azurechinacloud" | "china" => Self::China,
            other => {
                warn!(environment = other, "Unrecognized cloud environment, using public cloud");
                Self::Public
            }
        }
    }

    /// Login authority host
    pub fn authority_host(&self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }

    /// Microsoft Graph endpoint
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "AZUREPUBLICCLOUD"),
            Self::UsGovernment => write!(f, "AZUREUSGOVERNMENTCLOUD"),
            Self::China => write!(f, "AZURECHINACLOUD"),
        }
    }
}

// ============================================================================
// Column Type
// ============================================================================

/// Logical type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    String,
    Bool,
    Int,
    Double,
    /// RFC 3339 timestamp
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl ColumnType {
    /// Whether values of this type are quoted in an OData filter
    pub fn is_quoted(&self) -> bool {
        matches!(self, Self::String)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.trim().is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.trim().is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Convert a snake_case column name to the provider's camelCase field name
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
