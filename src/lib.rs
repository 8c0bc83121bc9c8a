// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # entra-tables
//!
//! Microsoft Entra ID directory objects as queryable tables, read through
//! Microsoft Graph.
//!
//! ## Features
//!
//! - **Credential resolution**: client secret, certificate, Azure CLI and
//!   managed identity, picked from config and `AZURE_*` variables
//! - **Predicate pushdown**: host predicates become one OData `$filter`
//! - **Projection**: requested columns become `$select` and `$expand`
//! - **Row streaming**: follows `@odata.nextLink` and stops as soon as the
//!   consumer has enough rows
//! - **Output**: JSON lines or Parquet
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entra_tables::{load_table, Connection, ConnectionConfig, ListRequest, PredicateSet};
//! use entra_tables::config::ProcessEnvironment;
//!
//! #[tokio::main]
//! async fn main() -> entra_tables::Result<()> {
//!     let connection = Connection::connect(&ConnectionConfig::new(), &ProcessEnvironment)?;
//!     let users = load_table("entra_user")?;
//!
//!     let request = ListRequest::new()
//!         .with_predicates(PredicateSet::new().eq("user_type", "Guest"))
//!         .with_columns(["id", "display_name"])
//!         .with_limit(10);
//!
//!     for row in connection.list_rows(&users, &request).await? {
//!         println!("{}", serde_json::Value::Object(row));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Connection                            │
//! │   list(table, request, sink) → ScanStats    get(table, key)  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌───────────┬────────────┬────┴───────┬─────────────┬──────────┐
//! │   Auth    │   Query    │ Pagination │   Decode    │  Output  │
//! ├───────────┼────────────┼────────────┼─────────────┼──────────┤
//! │ Secret    │ $filter    │ nextLink   │ Paths       │ JSON     │
//! │ Cert JWT  │ $select    │ Early stop │ JSONPath    │ Arrow    │
//! │ Azure CLI │ $expand    │ Ignorable  │ Coercion    │ Parquet  │
//! │ MSI       │ $top       │ errors     │ Synthetics  │          │
//! └───────────┴────────────┴────────────┴─────────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Connection configuration and environment variables
pub mod config;

/// Credential resolution and token acquisition
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// OData filter and projection building
pub mod query;

/// `@odata.nextLink` paging and row streaming
pub mod pagination;

/// Path extraction and row flattening
pub mod decode;

/// Arrow/Parquet and JSON output
pub mod output;

/// Scan and lookup engine
pub mod engine;

/// Table definitions and YAML loader
pub mod table;

/// Built-in table definitions
pub mod tables;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use engine::{Connection, ListRequest, ScanStats};
pub use query::{Operator, PredicateSet, Qual};
pub use table::{load_table, load_table_from_str, TableDefinition};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
