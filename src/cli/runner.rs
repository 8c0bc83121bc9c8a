//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{ConnectionConfig, ProcessEnvironment};
use crate::engine::{Connection, ListRequest, ScanStats};
use crate::error::{Error, Result, ResultExt};
use crate::output::{table_schema, JsonLinesPrinter, ParquetWriter, ParquetWriterConfig};
use crate::query::{PredicateSet, Qual};
use crate::table::{load_table, ColumnSource, TableDefinition};
use crate::tables;
use crate::types::Row;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Tables => self.tables(),
            Commands::Columns { table } => self.columns(table),
            Commands::Query {
                table,
                predicates,
                filter,
                columns,
                limit,
                page_size,
            } => {
                let mut set = PredicateSet::new();
                for expr in predicates {
                    set = set.with_qual(Qual::parse(expr)?);
                }
                if let Some(filter) = filter {
                    set = set.with_raw_filter(filter.clone());
                }

                let mut request = ListRequest::new()
                    .with_predicates(set)
                    .with_columns(columns.iter().cloned());
                if let Some(limit) = limit {
                    request = request.with_limit(*limit);
                }
                if let Some(page_size) = page_size {
                    request = request.with_page_size(*page_size);
                }
                self.query(table, request).await
            }
            Commands::Get {
                table,
                key,
                columns,
            } => self.get(table, key, columns).await,
            Commands::Check => self.check().await,
        }
    }

    /// Load the connection config and connect
    fn connect(&self) -> Result<Connection> {
        let config = match &self.cli.config {
            Some(path) => ConnectionConfig::from_file(path)?,
            None => ConnectionConfig::new(),
        };
        Connection::connect(&config, &ProcessEnvironment)
    }

    /// Writer for JSON output: the `--output` file or stdout
    fn json_out(&self) -> Result<JsonLinesPrinter<Box<dyn Write>>> {
        let out: Box<dyn Write> = match &self.cli.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };
        Ok(match self.cli.format {
            OutputFormat::Pretty => JsonLinesPrinter::pretty(out),
            OutputFormat::Json | OutputFormat::Parquet => JsonLinesPrinter::new(out),
        })
    }

    /// List built-in tables
    fn tables(&self) -> Result<()> {
        let mut printer = self.json_out()?;
        for name in tables::list_builtin() {
            let table = load_table(name)?;
            printer.write_value(&json!({
                "name": table.name,
                "description": table.description,
                "endpoint": format!("{}/{}", table.api_version.as_str(), table.endpoint),
                "singleton": table.singleton,
            }))?;
        }
        printer.finish()?;
        Ok(())
    }

    /// Show table columns
    fn columns(&self, table: &str) -> Result<()> {
        let table = load_table(table)?;
        let mut printer = self.json_out()?;
        for column in &table.columns {
            let source = match column.source() {
                ColumnSource::Field { field, path } => path.unwrap_or(field),
                ColumnSource::Expand { relation, .. } => format!("$expand={relation}"),
                ColumnSource::Synthetic(_) => "(computed)".to_string(),
            };
            printer.write_value(&json!({
                "name": column.name,
                "type": column.column_type,
                "source": source,
                "operators": column.operators,
                "description": column.description,
            }))?;
        }
        printer.finish()?;
        Ok(())
    }

    /// Stream table rows to the chosen output
    async fn query(&self, table: &str, request: ListRequest) -> Result<()> {
        let table = load_table(table)?;
        let connection = self.connect()?;

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current row");
                flag.store(true, Ordering::SeqCst);
            }
        });
        let request = request.with_cancel(cancel);

        let result = match self.cli.format {
            OutputFormat::Parquet => {
                let path = self
                    .cli
                    .output
                    .as_deref()
                    .ok_or_else(|| Error::config("parquet output requires --output"))?;
                Self::query_parquet(&connection, &table, &request, path).await
            }
            OutputFormat::Json | OutputFormat::Pretty => {
                self.query_json(&connection, &table, &request).await
            }
        };
        interrupt.abort();

        let stats = result?;
        info!(
            table = %stats.table,
            rows = stats.rows,
            pages = stats.pages,
            duration_ms = stats.duration_ms,
            "Query finished"
        );
        if self.cli.verbose {
            eprintln!("{}", serde_json::to_string(&stats)?);
        }
        Ok(())
    }

    async fn query_json(
        &self,
        connection: &Connection,
        table: &TableDefinition,
        request: &ListRequest,
    ) -> Result<ScanStats> {
        let mut printer = self.json_out()?;
        let mut failure = None;
        let stats = {
            let mut sink = |row: Row| match printer.print(&row) {
                Ok(()) => true,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            };
            connection.list(table, request, &mut sink).await?
        };
        if let Some(e) = failure {
            return Err(e);
        }
        printer.finish()?;
        Ok(stats)
    }

    async fn query_parquet(
        connection: &Connection,
        table: &TableDefinition,
        request: &ListRequest,
        path: &Path,
    ) -> Result<ScanStats> {
        let schema = table_schema(table, &request.columns)?;
        let mut writer = ParquetWriter::new(path, schema, &ParquetWriterConfig::new())?;
        let mut failure = None;
        let stats = {
            let mut sink = |row: Row| match writer.push(row) {
                Ok(()) => true,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            };
            connection.list(table, request, &mut sink).await?
        };
        if let Some(e) = failure {
            return Err(e);
        }
        let written = writer.close()?;
        info!(path = %path.display(), rows = written, "Wrote parquet file");
        Ok(stats)
    }

    /// Fetch and print one object
    async fn get(&self, table: &str, key: &str, columns: &[String]) -> Result<()> {
        let table = load_table(table)?;
        let connection = self.connect()?;

        let Some(row) = connection.get(&table, key, columns).await? else {
            return Err(Error::Other(format!(
                "{}: no object with key '{key}'",
                table.name
            )));
        };

        match self.cli.format {
            OutputFormat::Parquet => {
                let path = self
                    .cli
                    .output
                    .as_deref()
                    .ok_or_else(|| Error::config("parquet output requires --output"))?;
                let schema = table_schema(&table, columns)?;
                let mut writer = ParquetWriter::new(path, schema, &ParquetWriterConfig::new())?;
                writer.push(row)?;
                writer.close()?;
            }
            OutputFormat::Json | OutputFormat::Pretty => {
                let mut printer = self.json_out()?;
                printer.print(&row)?;
                printer.finish()?;
            }
        }
        Ok(())
    }

    /// Resolve credentials and acquire a token
    async fn check(&self) -> Result<()> {
        let connection = self.connect()?;
        let report = connection.check().await?;
        let mut printer = self.json_out()?;
        printer.write_value(&report)?;
        printer.finish()?;
        Ok(())
    }
}
