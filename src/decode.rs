//! Result decoding.
//!
//! Converts the warehouse's per-cell tagged value union into uniform
//! row-oriented records keyed by column name.

use serde_json::Value;
use thiserror::Error;

use crate::warehouse::protocol::{CellValue, StatementResult};

/// One decoded result row: column name → scalar JSON value.
pub type ResultRow = serde_json::Map<String, Value>;

/// Errors that can occur while decoding a statement result.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A row's cell count does not match the column metadata.
    #[error("row {row} has {cells} cells but the result describes {columns} columns")]
    ShapeMismatch {
        row: usize,
        cells: usize,
        columns: usize,
    },
}

/// Decode a raw statement result into a list of rows.
///
/// Column names are read once from the column metadata, in order, and
/// zipped positionally with each row's cells. Duplicate column names
/// collapse to a single entry; the last cell for a name wins.
///
/// # Errors
///
/// Returns [`DecodeError::ShapeMismatch`] if any row's cell count differs
/// from the column count.
pub fn decode(result: &StatementResult) -> Result<Vec<ResultRow>, DecodeError> {
    let columns: Vec<&str> = result
        .column_metadata
        .iter()
        .map(|col| col.name.as_str())
        .collect();

    let mut rows = Vec::with_capacity(result.records.len());
    for (index, record) in result.records.iter().enumerate() {
        if record.len() != columns.len() {
            return Err(DecodeError::ShapeMismatch {
                row: index,
                cells: record.len(),
                columns: columns.len(),
            });
        }

        let mut row = ResultRow::new();
        for (name, cell) in columns.iter().zip(record) {
            row.insert((*name).to_string(), decode_cell(cell));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Decode one tagged cell into a JSON scalar.
///
/// Tags are checked in a fixed order (string, long, double, boolean) so
/// that a malformed cell populating more than one tag decodes
/// deterministically. A cell with no populated tag is NULL.
fn decode_cell(cell: &CellValue) -> Value {
    if let Some(s) = &cell.string_value {
        Value::String(s.clone())
    } else if let Some(v) = cell.long_value {
        Value::Number(v.into())
    } else if let Some(v) = cell.double_value {
        // Non-finite doubles have no JSON representation; treat as NULL.
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    } else if let Some(b) = cell.boolean_value {
        Value::Bool(b)
    } else {
        Value::Null
    }
}
