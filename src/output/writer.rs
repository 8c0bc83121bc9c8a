//! Parquet file writer
//!
//! Buffers rows and writes them to Parquet in fixed-size record batches.

use super::schema::rows_to_batch;
use crate::error::{Error, Result};
use crate::types::Row;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Configuration for Parquet writer
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    batch_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
            batch_size: 1000,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Rows buffered before a batch is written
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Rows buffered before a batch is written
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Writes table rows to a Parquet file
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
    buffer: Vec<Row>,
    batch_size: usize,
    rows_written: usize,
}

impl ParquetWriter {
    /// Create `path` and prepare to write rows of `schema`
    pub fn new(path: impl AsRef<Path>, schema: Schema, config: &ParquetWriterConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::output(format!("Failed to create {}: {e}", path.display())))?;

        let schema = Arc::new(schema);
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(config.build_properties()))?;

        Ok(Self {
            writer,
            schema,
            buffer: Vec::with_capacity(config.batch_size),
            batch_size: config.batch_size,
            rows_written: 0,
        })
    }

    /// Buffer a row, writing a batch when the buffer is full
    pub fn push(&mut self, row: Row) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered rows
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = rows_to_batch(&self.schema, &self.buffer)?;
        self.writer.write(&batch)?;
        self.rows_written += batch.num_rows();
        self.buffer.clear();
        Ok(())
    }

    /// Rows written so far, excluding the buffer
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and finalize the file
    pub fn close(mut self) -> Result<usize> {
        self.flush()?;
        self.writer.close()?;
        Ok(self.rows_written)
    }
}
