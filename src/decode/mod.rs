//! Row decoding
//!
//! Flattens raw Graph items into rows using the table's column list.
//!
//! # Overview
//!
//! - `RowFlattener` - Column-driven item to row transform
//! - `extract_path` - Dot-path and JSONPath lookups inside an item
//! - `coerce` - Value conversion to a declared column type

mod flatten;
mod path;

pub use flatten::{coerce, parse_timestamp, FlattenContext, RowFlattener};
pub use path::{extract_path, is_jsonpath, validate_jsonpath};

#[cfg(test)]
mod tests;
