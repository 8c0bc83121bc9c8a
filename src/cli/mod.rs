//! CLI module
//!
//! Command-line interface over the table engine.
//!
//! # Commands
//!
//! - `tables` - List built-in tables
//! - `columns` - Show the columns of a table
//! - `query` - Stream rows with predicates, projection and a limit
//! - `get` - Fetch one object by key
//! - `check` - Resolve credentials and acquire a token

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
