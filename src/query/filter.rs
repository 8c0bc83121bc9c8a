//! OData `$filter` construction
//!
//! Turns host predicates into a single `$filter` expression. Quals that the
//! table cannot push down are returned as residuals and evaluated locally
//! against flattened rows.

use crate::error::{Error, Result};
use crate::table::{ColumnDefinition, TableDefinition};
use crate::types::{ColumnType, JsonValue, Row};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a qual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    /// Host-side symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// OData comparison keyword
    pub fn odata(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" | "==" => Ok(Self::Eq),
            "<>" | "!=" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            other => Err(Error::predicate(format!("unknown operator '{other}'"))),
        }
    }
}

// ============================================================================
// Quals and predicate sets
// ============================================================================

/// One `(column, operator, value)` predicate
///
/// An array value with `=` means "any of".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qual {
    pub column: String,
    pub operator: Operator,
    pub value: JsonValue,
}

impl Qual {
    /// Create a qual
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parse `column<op>value`, e.g. `account_enabled<>true` or `user_type=Guest`
    ///
    /// Values are read as JSON when they parse (`true`, `42`), else as text.
    /// Single-quoted values are always text.
    pub fn parse(expr: &str) -> Result<Self> {
        let position = expr
            .find(['=', '<', '>', '!'])
            .ok_or_else(|| Error::predicate(format!("'{expr}' has no operator")))?;
        let column = expr[..position].trim();
        let rest = &expr[position..];
        let op_len = ["<>", "<=", ">=", "!=", "=="]
            .iter()
            .find(|op| rest.starts_with(*op))
            .map_or(1, |op| op.len());
        let operator: Operator = rest[..op_len].parse()?;
        let raw = rest[op_len..].trim();

        if column.is_empty() {
            return Err(Error::predicate(format!("'{expr}' has no column")));
        }

        let value = match raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            Some(text) => JsonValue::String(text.to_string()),
            None => serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string())),
        };

        Ok(Self::new(column, operator, value))
    }

    /// Evaluate against a flattened row
    ///
    /// Comparisons with a missing or null value are false.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.column).filter(|v| !v.is_null()) else {
            return false;
        };
        match (&self.operator, &self.value) {
            (Operator::Eq, JsonValue::Array(options)) => options
                .iter()
                .any(|v| compare(actual, v) == Some(Ordering::Equal)),
            (op, expected) => match compare(actual, expected) {
                Some(ordering) => match op {
                    Operator::Eq => ordering == Ordering::Equal,
                    Operator::Ne => ordering != Ordering::Equal,
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Ge => ordering != Ordering::Less,
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                },
                None => false,
            },
        }
    }
}

impl fmt::Display for Qual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}

/// Predicates for one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateSet {
    /// Column predicates, AND-ed
    pub quals: Vec<Qual>,
    /// Raw OData filter; when non-empty it replaces every derived predicate
    pub raw_filter: Option<String>,
}

impl PredicateSet {
    /// Empty predicate set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a qual
    #[must_use]
    pub fn with_qual(mut self, qual: Qual) -> Self {
        self.quals.push(qual);
        self
    }

    /// Add an equality qual
    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.with_qual(Qual::new(column, Operator::Eq, value))
    }

    /// Set the raw filter override
    #[must_use]
    pub fn with_raw_filter(mut self, filter: impl Into<String>) -> Self {
        self.raw_filter = Some(filter.into());
        self
    }

    /// Raw filter, if set and non-blank
    pub fn raw(&self) -> Option<&str> {
        self.raw_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
    }

    /// Nothing to filter on
    pub fn is_empty(&self) -> bool {
        self.quals.is_empty() && self.raw().is_none()
    }
}

/// Result of planning a filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPlan {
    /// `$filter` expression sent to the provider
    pub filter: Option<String>,
    /// Quals evaluated locally on flattened rows
    pub residual: Vec<Qual>,
}

impl FilterPlan {
    /// Whether a row passes every residual qual
    pub fn accepts(&self, row: &Row) -> bool {
        self.residual.iter().all(|q| q.matches(row))
    }
}

// ============================================================================
// Building
// ============================================================================

/// Build the `$filter` for a table from a predicate set
///
/// A raw filter wins outright. Otherwise each filterable column contributes
/// its clauses in table column order: several `=` values become one
/// parenthesised `or` group, `<>` on a boolean becomes equality with the
/// negated value, and clauses are joined with ` and `.
pub fn build_filter(table: &TableDefinition, predicates: &PredicateSet) -> Result<FilterPlan> {
    if let Some(raw) = predicates.raw() {
        return Ok(FilterPlan {
            filter: Some(raw.to_string()),
            residual: Vec::new(),
        });
    }

    for qual in &predicates.quals {
        table.require_column(&qual.column)?;
    }

    let mut clauses = Vec::new();
    let mut residual = Vec::new();

    for column in &table.columns {
        let quals: Vec<&Qual> = predicates
            .quals
            .iter()
            .filter(|q| q.column == column.name)
            .collect();
        if quals.is_empty() {
            continue;
        }

        let Some(property) = column.filter_property() else {
            residual.extend(quals.into_iter().cloned());
            continue;
        };

        let mut equals = Vec::new();
        let mut others = Vec::new();

        for qual in quals {
            if !column.supports(qual.operator) {
                residual.push(qual.clone());
                continue;
            }
            match (qual.operator, &qual.value) {
                (Operator::Eq, JsonValue::Array(values)) => {
                    for value in values {
                        equals.push(literal(column, value)?);
                    }
                }
                (Operator::Eq, value) => equals.push(literal(column, value)?),
                (Operator::Ne, value) if column.column_type == ColumnType::Bool => {
                    let negated = !as_bool(column, value)?;
                    others.push(format!("{property} eq {negated}"));
                }
                (op, value) => {
                    others.push(format!("{property} {} {}", op.odata(), literal(column, value)?));
                }
            }
        }

        match equals.len() {
            0 => {}
            1 => clauses.push(format!("{property} eq {}", equals[0])),
            _ => {
                let alternatives: Vec<String> = equals
                    .iter()
                    .map(|v| format!("{property} eq {v}"))
                    .collect();
                clauses.push(format!("({})", alternatives.join(" or ")));
            }
        }
        clauses.extend(others);
    }

    Ok(FilterPlan {
        filter: (!clauses.is_empty()).then(|| clauses.join(" and ")),
        residual,
    })
}

/// Page size sent as `$top`
///
/// `None` when no size was requested, so the provider default applies.
pub fn clamp_page_size(requested: Option<u64>, provider_max: u32) -> Option<u32> {
    let max = u64::from(provider_max.max(1));
    requested.map(|p| p.clamp(1, max) as u32)
}

/// Format a value as an OData literal for a column
fn literal(column: &ColumnDefinition, value: &JsonValue) -> Result<String> {
    let invalid = || {
        Error::predicate(format!(
            "value {value} is not a valid {} for column '{}'",
            column.column_type, column.name
        ))
    };

    match column.column_type {
        ColumnType::String => {
            let text = match value {
                JsonValue::String(s) => s.clone(),
                JsonValue::Null => return Err(invalid()),
                other => other.to_string(),
            };
            Ok(format!("'{}'", text.replace('\'', "''")))
        }
        ColumnType::Bool => as_bool(column, value).map(|b| b.to_string()),
        ColumnType::Int | ColumnType::Double => match value {
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::String(s) if s.trim().parse::<f64>().is_ok() => Ok(s.trim().to_string()),
            _ => Err(invalid()),
        },
        ColumnType::Timestamp => match value {
            JsonValue::String(s) if DateTime::parse_from_rfc3339(s.trim()).is_ok() => {
                Ok(s.trim().to_string())
            }
            _ => Err(invalid()),
        },
        ColumnType::Json => Err(Error::predicate(format!(
            "column '{}' cannot be filtered",
            column.name
        ))),
    }
}

fn as_bool(column: &ColumnDefinition, value: &JsonValue) -> Result<bool> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::predicate(format!(
            "value {value} is not a valid bool for column '{}'",
            column.name
        ))),
    }
}

/// Order two JSON values, coercing text to the other side's type
fn compare(actual: &JsonValue, expected: &JsonValue) -> Option<Ordering> {
    use serde_json::Value::{Bool, Number, String as Text};

    match (actual, expected) {
        (Number(a), Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Number(a), Text(b)) => a.as_f64()?.partial_cmp(&b.trim().parse::<f64>().ok()?),
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (Bool(a), Text(b)) => Some(a.cmp(&b.parse::<bool>().ok()?)),
        (Text(a), Text(b)) => match (
            DateTime::parse_from_rfc3339(a),
            DateTime::parse_from_rfc3339(b),
        ) {
            (Ok(a), Ok(b)) => Some(a.cmp(&b)),
            _ => Some(a.to_lowercase().cmp(&b.to_lowercase())),
        },
        (Text(a), other) => Some(a.cmp(&other.to_string())),
        _ => None,
    }
}
