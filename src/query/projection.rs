//! Column projection
//!
//! Maps requested columns to `$select` and `$expand` so only the needed
//! provider fields travel over the wire.

use crate::error::Result;
use crate::table::{ColumnSource, SyntheticKind, TableDefinition};
use crate::template;

/// Fields to request from the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Top-level provider fields for `$select`
    pub select: Vec<String>,
    /// Expansion clauses for `$expand`
    pub expand: Vec<String>,
}

impl Projection {
    /// `$select` value, if any
    pub fn select_param(&self) -> Option<String> {
        (!self.select.is_empty()).then(|| self.select.join(","))
    }

    /// `$expand` value, if any
    pub fn expand_param(&self) -> Option<String> {
        (!self.expand.is_empty()).then(|| self.expand.join(","))
    }

    fn push_select(&mut self, field: &str) {
        // OData annotations come back unasked and cannot be selected
        if field.starts_with('@') || field.is_empty() {
            return;
        }
        if !self.select.iter().any(|f| f == field) {
            self.select.push(field.to_string());
        }
    }

    fn push_expand(&mut self, clause: String) {
        if !self.expand.contains(&clause) {
            self.expand.push(clause);
        }
    }
}

/// Build the projection for `columns` of `table`
///
/// An empty column list means every column. The key column is always
/// selected. Synthetic columns add only the fields they read: a title
/// reads its template fields plus `displayName`/`id` when the table
/// declares columns for them.
pub fn project<S: AsRef<str>>(table: &TableDefinition, columns: &[S]) -> Result<Projection> {
    let requested: Vec<&str> = if columns.is_empty() {
        table.column_names()
    } else {
        columns.iter().map(AsRef::as_ref).collect()
    };

    let mut projection = Projection::default();

    if let ColumnSource::Field { field, .. } = table.require_column(&table.key)?.source() {
        projection.push_select(top_level(&field));
    }

    for name in requested {
        let column = table.require_column(name)?;
        match column.source() {
            ColumnSource::Field { field, .. } => projection.push_select(top_level(&field)),
            ColumnSource::Expand { relation, select } => {
                let clause = if select.is_empty() {
                    relation
                } else {
                    format!("{relation}($select={})", select.join(","))
                };
                projection.push_expand(clause);
            }
            ColumnSource::Synthetic(SyntheticKind::Title) => {
                if let Some(tpl) = column.template.as_deref() {
                    for field in template::item_fields(tpl) {
                        projection.push_select(&field);
                    }
                }
                // Fallback fields, only where the entity has them
                for fallback in ["displayName", "id"] {
                    if reads_field(table, fallback) {
                        projection.push_select(fallback);
                    }
                }
            }
            ColumnSource::Synthetic(SyntheticKind::TenantId | SyntheticKind::Filter) => {}
        }
    }

    Ok(projection)
}

/// Whether some column of `table` reads the provider field `field`
fn reads_field(table: &TableDefinition, field: &str) -> bool {
    table.columns.iter().any(|c| match c.source() {
        ColumnSource::Field { field: f, .. } => top_level(&f) == field,
        _ => false,
    })
}

/// First segment of a dot/bracket path
fn top_level(field: &str) -> &str {
    let end = field.find(['.', '[', '/']).unwrap_or(field.len());
    &field[..end]
}
