//! Row printers for terminal and pipe output

use crate::error::Result;
use crate::types::Row;
use serde::Serialize;
use std::io::Write;

/// Writes one JSON document per row
pub struct JsonLinesPrinter<W: Write> {
    out: W,
    pretty: bool,
    rows: usize,
}

impl<W: Write> JsonLinesPrinter<W> {
    /// Compact, one row per line
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: false,
            rows: 0,
        }
    }

    /// Indented, rows separated by blank lines
    pub fn pretty(out: W) -> Self {
        Self {
            out,
            pretty: true,
            rows: 0,
        }
    }

    /// Print one row
    pub fn print(&mut self, row: &Row) -> Result<()> {
        self.write_value(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Print any serializable value in the printer's style
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.pretty {
            if self.rows > 0 {
                writeln!(self.out)?;
            }
            serde_json::to_writer_pretty(&mut self.out, value)?;
        } else {
            serde_json::to_writer(&mut self.out, value)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// Rows printed
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the writer
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
