//! Arrow schemas and record batches from table rows
//!
//! Schemas come from the declared column types, so every batch of a table
//! has the same shape no matter which values happen to be present.

use crate::decode::parse_timestamp;
use crate::error::{Error, Result};
use crate::table::TableDefinition;
use crate::types::{ColumnType, JsonValue, Row};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Arrow type for a column type
///
/// `json` columns are carried as their serialized text.
pub fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::String | ColumnType::Json => DataType::Utf8,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Int => DataType::Int64,
        ColumnType::Double => DataType::Float64,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
    }
}

/// Schema for `columns` of `table` (all columns when empty)
pub fn table_schema<S: AsRef<str>>(table: &TableDefinition, columns: &[S]) -> Result<Schema> {
    let fields = if columns.is_empty() {
        table
            .columns
            .iter()
            .map(|c| Field::new(&c.name, arrow_type(c.column_type), true))
            .collect::<Vec<_>>()
    } else {
        columns
            .iter()
            .map(|name| {
                let column = table.require_column(name.as_ref())?;
                Ok(Field::new(&column.name, arrow_type(column.column_type), true))
            })
            .collect::<Result<Vec<_>>>()?
    };
    Ok(Schema::new(fields))
}

/// Build a record batch from rows
///
/// Missing keys and nulls become nulls. A value that does not fit its
/// column type is an error.
pub fn rows_to_batch(schema: &Arc<Schema>, rows: &[Row]) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| build_array(field, rows))
        .collect::<Result<Vec<ArrayRef>>>()?;

    if columns.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::clone(schema)));
    }
    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

fn build_array(field: &Field, rows: &[Row]) -> Result<ArrayRef> {
    let name = field.name();
    let values = rows.iter().map(|row| row.get(name).filter(|v| !v.is_null()));
    let mismatch = |value: &JsonValue| {
        Error::output(format!(
            "column '{name}' expects {}, got {value}",
            field.data_type()
        ))
    };

    let array: ArrayRef = match field.data_type() {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(v.as_bool().ok_or_else(|| mismatch(v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(v.as_i64().ok_or_else(|| mismatch(v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => builder.append_value(v.as_f64().ok_or_else(|| mismatch(v))?),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(rows.len())
                .with_timezone_opt(tz.clone());
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(v) => {
                        let micros = v
                            .as_str()
                            .and_then(parse_timestamp)
                            .map(|ts| ts.timestamp_micros())
                            .ok_or_else(|| mismatch(v))?;
                        builder.append_value(micros);
                    }
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 16);
            for value in values {
                match value {
                    None => builder.append_null(),
                    Some(JsonValue::String(s)) => builder.append_value(s),
                    Some(other) => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
        other => {
            return Err(Error::output(format!(
                "unsupported type {other} for column '{name}'"
            )))
        }
    };

    Ok(array)
}
