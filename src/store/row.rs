//! Generic tabular results
//!
//! Store adapters decode their native rows into these types so the
//! marshaller never sees a driver type.

use std::fmt::Write;

/// Column type tag, mapped from the store's type oid
///
/// Only the types the marshaller treats specially get their own variant
/// group; anything else is carried as [`SqlType::Unknown`] and rendered as
/// text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int2,
    Int4,
    Int8,
    Bool,
    Float4,
    Float8,
    Numeric,
    Uuid,
    Text,
    Varchar,
    Char,
    Name,
    Timestamp,
    TimestampTz,
    Date,
    Json,
    Jsonb,
    Bytea,
    Unknown(u32),
}

impl SqlType {
    /// Map a PostgreSQL type oid to a type tag
    pub fn from_oid(oid: u32) -> Self {
        match oid {
            21 => SqlType::Int2,
            23 => SqlType::Int4,
            20 => SqlType::Int8,
            16 => SqlType::Bool,
            700 => SqlType::Float4,
            701 => SqlType::Float8,
            1700 => SqlType::Numeric,
            2950 => SqlType::Uuid,
            25 => SqlType::Text,
            1043 => SqlType::Varchar,
            1042 => SqlType::Char,
            19 => SqlType::Name,
            1114 => SqlType::Timestamp,
            1184 => SqlType::TimestampTz,
            1082 => SqlType::Date,
            114 => SqlType::Json,
            3802 => SqlType::Jsonb,
            17 => SqlType::Bytea,
            other => SqlType::Unknown(other),
        }
    }

    /// Whether values of this type become JSON numbers
    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::Int2 | SqlType::Int4 | SqlType::Int8)
    }
}

/// A decoded cell value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl CellValue {
    /// The store's canonical text form, `None` for null
    ///
    /// Bytes use PostgreSQL's hex output format (`\x0a1b...`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Bytes(bytes) => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("\\x");
                for b in bytes {
                    let _ = write!(out, "{:02x}", b);
                }
                Some(out)
            }
        }
    }

    /// Raw bytes of the value; null is empty
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            CellValue::Null => Vec::new(),
            CellValue::Integer(i) => i.to_string().into_bytes(),
            CellValue::Text(s) => s.into_bytes(),
            CellValue::Bytes(bytes) => bytes,
        }
    }
}

/// One named, typed cell of a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub column: String,
    pub sql_type: SqlType,
    pub value: CellValue,
}

impl Cell {
    pub fn new(column: impl Into<String>, sql_type: SqlType, value: CellValue) -> Self {
        Self {
            column: column.into(),
            sql_type,
            value,
        }
    }

    pub fn null(column: impl Into<String>, sql_type: SqlType) -> Self {
        Self::new(column, sql_type, CellValue::Null)
    }

    pub fn integer(column: impl Into<String>, value: i64) -> Self {
        Self::new(column, SqlType::Int4, CellValue::Integer(value))
    }

    pub fn text(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, SqlType::Text, CellValue::Text(value.into()))
    }

    pub fn bytes(column: impl Into<String>, value: Vec<u8>) -> Self {
        Self::new(column, SqlType::Bytea, CellValue::Bytes(value))
    }

    pub fn is_null(&self) -> bool {
        self.value == CellValue::Null
    }
}

/// An ordered row of cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    cells: Vec<Cell>,
}

impl ResultRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }
}

/// All rows returned by one execution, in store order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRowSet {
    rows: Vec<ResultRow>,
}

impl ResultRowSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<ResultRow>> for ResultRowSet {
    fn from(rows: Vec<ResultRow>) -> Self {
        Self::new(rows)
    }
}

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Int(i32),
    Text(String),
}
