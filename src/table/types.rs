//! Table definition types
//!
//! These types represent the YAML structure of a table definition.

use crate::error::Error;
use crate::query::Operator;
use crate::types::{to_camel_case, ColumnType};
use serde::{Deserialize, Serialize};

fn default_page_size_max() -> u32 {
    999
}

fn default_true() -> bool {
    true
}

fn default_key() -> String {
    "id".to_string()
}

// ============================================================================
// Table Definition
// ============================================================================

/// A Graph collection (or singleton object) exposed as a table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableDefinition {
    /// Table name (e.g. `entra_user`)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Collection path relative to the API version root (e.g. `users`)
    pub endpoint: String,

    /// Graph API version
    #[serde(default)]
    pub api_version: ApiVersion,

    /// The endpoint returns one object instead of a collection
    #[serde(default)]
    pub singleton: bool,

    /// Largest `$top` the endpoint accepts
    #[serde(default = "default_page_size_max")]
    pub page_size_max: u32,

    /// The endpoint accepts `$top`
    #[serde(default = "default_true")]
    pub supports_top: bool,

    /// Key column used by single-object lookups
    #[serde(default = "default_key")]
    pub key: String,

    /// Path template for a single object (`{{ key }}` is the key)
    #[serde(default)]
    pub get_endpoint: Option<String>,

    /// Filters need `ConsistencyLevel: eventual` and `$count=true`
    #[serde(default)]
    pub advanced_query: bool,

    /// Provider errors that mean "no rows" rather than failure
    #[serde(default)]
    pub ignore_errors: IgnoreErrors,

    /// Column definitions, in output order
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find a column by name, or fail with `ColumnNotFound`
    pub fn require_column(&self, name: &str) -> crate::Result<&ColumnDefinition> {
        self.column(name)
            .ok_or_else(|| Error::column_not_found(&self.name, name))
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Path template for a single object
    pub fn get_endpoint_template(&self) -> String {
        self.get_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/{{{{ key }}}}", self.endpoint.trim_end_matches('/')))
    }

    /// Whether single-object lookups are possible
    pub fn supports_get(&self) -> bool {
        !self.singleton
    }
}

/// Graph API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v1.0")]
    V1,
    #[serde(rename = "beta")]
    Beta,
}

impl ApiVersion {
    /// Path segment for this version
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1.0",
            Self::Beta => "beta",
        }
    }
}

// ============================================================================
// Ignorable Errors
// ============================================================================

/// Provider errors that end a scan quietly
///
/// Codes match exactly. Messages match as substrings, for endpoints that
/// report licensing or feature gaps only in the message text.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IgnoreErrors {
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl IgnoreErrors {
    /// Ignore the given codes
    pub fn codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            messages: Vec::new(),
        }
    }

    /// Whether `error` should be treated as an empty result
    pub fn matches(&self, error: &Error) -> bool {
        match error {
            Error::Provider { code, message, .. } => {
                self.codes.iter().any(|c| c == code)
                    || self.messages.iter().any(|m| message.contains(m.as_str()))
            }
            _ => false,
        }
    }

    /// Nothing is ignorable
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.messages.is_empty()
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// A table column
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnDefinition {
    /// Column name (snake_case)
    pub name: String,

    /// Logical type
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Provider field; defaults to the camelCase column name
    #[serde(default)]
    pub field: Option<String>,

    /// Read path inside the item when it differs from `field`
    /// (dot path with `[n]`, or a JSONPath starting with `$`)
    #[serde(default)]
    pub path: Option<String>,

    /// Provider property used in `$filter` when it differs from `field`
    #[serde(default)]
    pub filter_field: Option<String>,

    /// Navigation property fetched with `$expand`
    #[serde(default)]
    pub expand: Option<String>,

    /// Sub-fields selected inside the expansion
    #[serde(default)]
    pub select: Vec<String>,

    /// Value computed locally instead of read from the item
    #[serde(default)]
    pub synthetic: Option<SyntheticKind>,

    /// Template for the `title` synthetic
    #[serde(default)]
    pub template: Option<String>,

    /// Operators that can be pushed into `$filter`
    #[serde(default)]
    pub operators: Vec<Operator>,
}

/// Locally computed columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticKind {
    /// Display title
    Title,
    /// Tenant the row came from
    TenantId,
    /// The raw filter used for the scan
    Filter,
}

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// A provider field, optionally read through a nested path
    Field { field: String, path: Option<String> },
    /// An expanded navigation property
    Expand { relation: String, select: Vec<String> },
    /// Computed locally
    Synthetic(SyntheticKind),
}

impl ColumnDefinition {
    /// Create a plain field column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            description: String::new(),
            field: None,
            path: None,
            filter_field: None,
            expand: None,
            select: Vec::new(),
            synthetic: None,
            template: None,
            operators: Vec::new(),
        }
    }

    /// Builder-style setter for pushdown operators
    #[must_use]
    pub fn with_operators(mut self, operators: &[Operator]) -> Self {
        self.operators = operators.to_vec();
        self
    }

    /// Resolve the value source
    pub fn source(&self) -> ColumnSource {
        if let Some(kind) = self.synthetic {
            return ColumnSource::Synthetic(kind);
        }
        if let Some(relation) = &self.expand {
            return ColumnSource::Expand {
                relation: relation.clone(),
                select: self.select.clone(),
            };
        }
        ColumnSource::Field {
            field: self
                .field
                .clone()
                .unwrap_or_else(|| to_camel_case(&self.name)),
            path: self.path.clone(),
        }
    }

    /// Provider property for `$filter`, if the column reads a provider field
    pub fn filter_property(&self) -> Option<String> {
        if let Some(field) = &self.filter_field {
            return Some(field.clone());
        }
        match self.source() {
            ColumnSource::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether `op` can be pushed into `$filter` for this column
    pub fn supports(&self, op: Operator) -> bool {
        self.operators.contains(&op) && self.filter_property().is_some()
    }
}
