//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Query Microsoft Entra ID directory objects as tables
#[derive(Parser, Debug)]
#[command(name = "entra-tables")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connection config file (YAML or JSON); AZURE_* variables fill the rest
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List built-in tables
    Tables,

    /// Show the columns of a table
    Columns {
        /// Built-in table name or path to a table YAML file
        table: String,
    },

    /// Stream the rows of a table
    Query {
        /// Built-in table name or path to a table YAML file
        table: String,

        /// Column predicate such as `user_type=Guest` or `account_enabled<>true` (repeatable)
        #[arg(short = 'w', long = "where")]
        predicates: Vec<String>,

        /// Raw OData filter; replaces every --where predicate
        #[arg(long)]
        filter: Option<String>,

        /// Columns to return (comma-separated, default all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Stop after this many rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Rows per page, clamped to what the endpoint allows
        #[arg(long)]
        page_size: Option<u64>,
    },

    /// Fetch one object by key
    Get {
        /// Built-in table name or path to a table YAML file
        table: String,

        /// Object key (usually the id)
        key: String,

        /// Columns to return (comma-separated, default all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Resolve credentials and acquire a token
    Check,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Indented JSON
    Pretty,
    /// Parquet file (requires --output)
    Parquet,
}
