//! Output module
//!
//! Turns table rows into Arrow record batches, Parquet files and JSON text.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Arrow schemas derived from declared column types
//! - Converting rows to Arrow RecordBatches
//! - Writing Parquet files
//! - JSON-lines and pretty JSON printing

mod printer;
mod schema;
mod writer;

pub use printer::JsonLinesPrinter;
pub use schema::{arrow_type, rows_to_batch, table_schema};
pub use writer::{ParquetWriter, ParquetWriterConfig};
