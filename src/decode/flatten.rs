//! Row flattening
//!
//! One generic transform turns a raw Graph item into a row keyed by column
//! name, driven entirely by the table's column definitions.

use super::path::extract_path;
use crate::error::{Error, Result};
use crate::table::{ColumnDefinition, ColumnSource, SyntheticKind, TableDefinition};
use crate::template::{self, TemplateContext};
use crate::types::{ColumnType, JsonValue, Row};
use chrono::{DateTime, SecondsFormat, Utc};

/// Scan-level values for synthetic columns
#[derive(Debug, Clone, Default)]
pub struct FlattenContext {
    /// Tenant the connection is bound to
    pub tenant_id: Option<String>,
    /// Filter expression sent with the scan
    pub filter: Option<String>,
}

impl FlattenContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tenant id
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Set the filter expression
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }
}

/// Flattens items of one table into rows
#[derive(Debug)]
pub struct RowFlattener<'a> {
    columns: Vec<&'a ColumnDefinition>,
    context: FlattenContext,
}

impl<'a> RowFlattener<'a> {
    /// Flattener producing every column of `table`
    pub fn new(table: &'a TableDefinition, context: FlattenContext) -> Self {
        Self {
            columns: table.columns.iter().collect(),
            context,
        }
    }

    /// Flattener producing only `columns`, in the order given
    ///
    /// An empty list selects every column.
    pub fn with_columns<S: AsRef<str>>(
        table: &'a TableDefinition,
        columns: &[S],
        context: FlattenContext,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Ok(Self::new(table, context));
        }
        let columns = columns
            .iter()
            .map(|name| table.require_column(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns, context })
    }

    /// Names of the produced columns
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Flatten one item
    pub fn flatten(&self, item: &JsonValue) -> Result<Row> {
        let mut row = Row::new();
        for column in &self.columns {
            let value = self.value_of(column, item)?;
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }

    fn value_of(&self, column: &ColumnDefinition, item: &JsonValue) -> Result<JsonValue> {
        let raw = match column.source() {
            ColumnSource::Field { field, path } => match path {
                Some(path) => extract_path(item, &path)?,
                None => item.get(&field).cloned(),
            },
            ColumnSource::Expand { relation, .. } => match &column.path {
                Some(path) => extract_path(item, path)?,
                None => item.get(&relation).cloned(),
            },
            ColumnSource::Synthetic(kind) => return Ok(self.synthetic(kind, column, item)),
        };

        match raw {
            None | Some(JsonValue::Null) => Ok(JsonValue::Null),
            Some(value) => coerce(value, column.column_type).map_err(|e| {
                Error::decode(format!("column '{}': {e}", column.name))
            }),
        }
    }

    fn synthetic(
        &self,
        kind: SyntheticKind,
        column: &ColumnDefinition,
        item: &JsonValue,
    ) -> JsonValue {
        let text = match kind {
            SyntheticKind::Title => title(column.template.as_deref(), item),
            SyntheticKind::TenantId => self.context.tenant_id.clone(),
            SyntheticKind::Filter => self.context.filter.clone(),
        };
        text.map_or(JsonValue::Null, JsonValue::String)
    }
}

/// Display title: the rendered template, else `displayName`, else `id`
fn title(template: Option<&str>, item: &JsonValue) -> Option<String> {
    if let Some(template) = template {
        // Templates referencing absent fields fall through to the defaults
        if let Ok(rendered) = template::render(template, &TemplateContext::for_item(item.clone())) {
            if !rendered.trim().is_empty() {
                return Some(rendered);
            }
        }
    }

    ["displayName", "id"]
        .iter()
        .find_map(|field| match item.get(field) {
            Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// Coerce a non-null value to a declared column type
pub fn coerce(value: JsonValue, column_type: ColumnType) -> Result<JsonValue> {
    let mismatch =
        |value: &JsonValue| Error::decode(format!("cannot read {value} as {column_type}"));

    match column_type {
        ColumnType::Json => Ok(value),
        ColumnType::String => Ok(match value {
            JsonValue::String(_) => value,
            JsonValue::Number(n) => JsonValue::String(n.to_string()),
            JsonValue::Bool(b) => JsonValue::String(b.to_string()),
            other => JsonValue::String(other.to_string()),
        }),
        ColumnType::Bool => match &value {
            JsonValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(JsonValue::Bool(true)),
                "false" => Ok(JsonValue::Bool(false)),
                _ => Err(mismatch(&value)),
            },
            _ => Err(mismatch(&value)),
        },
        ColumnType::Int => {
            let int = match &value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                JsonValue::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            int.map(JsonValue::from).ok_or_else(|| mismatch(&value))
        }
        ColumnType::Double => {
            let double = match &value {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            double
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .ok_or_else(|| mismatch(&value))
        }
        ColumnType::Timestamp => {
            let parsed = match &value {
                JsonValue::String(s) => parse_timestamp(s),
                JsonValue::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
                _ => None,
            };
            parsed
                .map(|ts| JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
                .ok_or_else(|| mismatch(&value))
        }
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less one read as UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
