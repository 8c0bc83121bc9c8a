//! Table definitions
//!
//! Parse table definitions from YAML.
//!
//! # Overview
//!
//! The table module provides:
//! - `TableDefinition` - Declarative Graph collection as a table
//! - `ColumnDefinition` - Column type, value source and pushdown operators
//! - YAML parsing with validation

mod parser;
mod types;

pub use parser::{load_table, load_table_from_str, validate_table};
pub use types::{
    ApiVersion, ColumnDefinition, ColumnSource, IgnoreErrors, SyntheticKind, TableDefinition,
};

#[cfg(test)]
mod tests;
