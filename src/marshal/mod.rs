//! # Row Marshaller
//!
//! Converts a generic [`ResultRowSet`] into JSON. The shape depends on the
//! row count:
//!
//! | rows | result |
//! |------|--------|
//! | 0 | `null` |
//! | 1 | object |
//! | N | array of N objects, store order |
//!
//! Keys are normalized column names in column order. Integer-typed cells
//! become numbers; every other non-null cell becomes its text form.

mod errors;
mod naming;

pub use errors::{MarshalError, MarshalResult};
pub use naming::normalize_column_name;

use serde_json::{Map, Value};

use crate::store::{Cell, CellValue, ResultRow, ResultRowSet};

/// Convert a result set to JSON
pub fn to_json(rows: &ResultRowSet) -> MarshalResult<Value> {
    match rows.rows() {
        [] => Ok(Value::Null),
        [row] => Ok(Value::Object(row_to_object(row)?)),
        many => many
            .iter()
            .map(|row| row_to_object(row).map(Value::Object))
            .collect::<MarshalResult<Vec<_>>>()
            .map(Value::Array),
    }
}

/// Convert one row to a JSON object keyed by normalized column name
pub fn row_to_object(row: &ResultRow) -> MarshalResult<Map<String, Value>> {
    let mut object = Map::with_capacity(row.cells().len());
    // original column per key, for the duplicate report
    let mut sources: Vec<(String, &str)> = Vec::with_capacity(row.cells().len());

    for cell in row.cells() {
        let key = normalize_column_name(&cell.column);

        if let Some((_, first)) = sources.iter().find(|(k, _)| *k == key) {
            return Err(MarshalError::DuplicateKey {
                key,
                first: first.to_string(),
                second: cell.column.clone(),
            });
        }

        object.insert(key.clone(), coerce_cell(cell)?);
        sources.push((key, &cell.column));
    }

    Ok(object)
}

/// Coerce one cell to a JSON value
pub fn coerce_cell(cell: &Cell) -> MarshalResult<Value> {
    if cell.is_null() {
        return Ok(Value::Null);
    }

    if cell.sql_type.is_integer() {
        return match &cell.value {
            CellValue::Integer(i) => Ok(Value::from(*i)),
            CellValue::Text(s) => {
                s.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| MarshalError::NotAnInteger {
                        column: cell.column.clone(),
                        value: s.clone(),
                    })
            }
            other => Err(MarshalError::NotAnInteger {
                column: cell.column.clone(),
                value: other.to_text().unwrap_or_default(),
            }),
        };
    }

    Ok(cell
        .value
        .to_text()
        .map(Value::String)
        .unwrap_or(Value::Null))
}

/// First column of the first row as raw bytes
///
/// No rows and a null cell both give an empty buffer.
pub fn to_blob(rows: ResultRowSet) -> Vec<u8> {
    rows.into_rows()
        .into_iter()
        .next()
        .and_then(|row| row.into_cells().into_iter().next())
        .map(|cell| cell.value.into_bytes())
        .unwrap_or_default()
}
