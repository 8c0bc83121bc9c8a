//! YAML parser for table definitions
//!
//! Parses and validates table YAML files.
//! Supports both built-in tables (by name) and custom YAML files (by path).

use crate::decode::validate_jsonpath;
use crate::error::{Error, Result};
use crate::table::types::{ColumnSource, SyntheticKind, TableDefinition};
use crate::tables;
use crate::types::ColumnType;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a table definition from a name or file path
///
/// Built-in table names (e.g. `entra_user`) are checked first, then the
/// input is read as a YAML file.
///
/// ```ignore
/// let users = load_table("entra_user")?;
/// let custom = load_table("./tables/my-table.yaml")?;
/// ```
pub fn load_table(name_or_path: impl AsRef<Path>) -> Result<TableDefinition> {
    let path = name_or_path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(yaml) = tables::get_builtin(&path_str) {
            return load_table_from_str(yaml);
        }
        if !path.exists() {
            return Err(Error::table_not_found(path_str));
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config(format!(
                "Table '{}' not found. Built-in tables: {}. Or provide a path to a YAML file.",
                path.display(),
                tables::list_builtin().join(", ")
            ))
        } else {
            Error::config(format!(
                "Failed to read table file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_table_from_str(&content)
}

/// Load a table definition from a YAML string
pub fn load_table_from_str(yaml: &str) -> Result<TableDefinition> {
    let def: TableDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse table YAML: {e}")))?;

    validate_table(&def)?;
    Ok(def)
}

/// Validate a table definition
pub fn validate_table(def: &TableDefinition) -> Result<()> {
    let invalid = |message: String| Error::invalid_table(&def.name, message);

    if def.name.is_empty() {
        return Err(Error::config("Table name cannot be empty"));
    }

    if def.endpoint.trim_matches('/').is_empty() {
        return Err(invalid("endpoint cannot be empty".to_string()));
    }

    if def.page_size_max == 0 {
        return Err(invalid("page_size_max must be at least 1".to_string()));
    }

    if def.columns.is_empty() {
        return Err(invalid("table must have at least one column".to_string()));
    }

    let mut seen = HashSet::new();
    for column in &def.columns {
        if column.name.is_empty() {
            return Err(invalid("column name cannot be empty".to_string()));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(invalid(format!("duplicate column '{}'", column.name)));
        }

        match column.source() {
            ColumnSource::Expand { relation, .. } if relation.trim().is_empty() => {
                return Err(invalid(format!(
                    "column '{}' expands an empty relation",
                    column.name
                )));
            }
            ColumnSource::Synthetic(kind) => {
                if !column.operators.is_empty() {
                    return Err(invalid(format!(
                        "synthetic column '{}' cannot declare operators",
                        column.name
                    )));
                }
                if column.template.is_some() && kind != SyntheticKind::Title {
                    return Err(invalid(format!(
                        "only title columns take a template ('{}')",
                        column.name
                    )));
                }
            }
            ColumnSource::Expand { .. } if !column.operators.is_empty() => {
                return Err(invalid(format!(
                    "expanded column '{}' cannot declare operators",
                    column.name
                )));
            }
            _ => {}
        }

        if let Some(path) = &column.path {
            validate_jsonpath(path)
                .map_err(|e| invalid(format!("column '{}': {e}", column.name)))?;
        }

        if column.column_type == ColumnType::Json && !column.operators.is_empty() {
            return Err(invalid(format!(
                "json column '{}' cannot declare operators",
                column.name
            )));
        }
    }

    if !seen.contains(def.key.as_str()) {
        return Err(invalid(format!("key column '{}' is not defined", def.key)));
    }

    Ok(())
}
