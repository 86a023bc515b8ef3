//! Core types for sqlpool: type tags, values, parameters and result tables

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};


/// Declared SQL type of a bound parameter or a result column
///
/// The tag drives both directions: how a parameter is encoded when it is
/// bound, and how a result cell is decoded when it is read back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    /// Short character data (VARCHAR)
    String,
    /// Long character data (TEXT, CLOB)
    Text,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// Double precision floating point
    Double,
    /// Boolean
    Bool,
    /// Date and time
    Timestamp,
    /// Calendar date, carried as a date-time at midnight
    Date,
    /// Raw bytes
    Binary,
    /// Driver-reported column type with no dedicated read rule
    Other(String),
}

impl SqlType {
    /// Map a driver-reported type name onto a tag.
    ///
    /// Matching is case-insensitive and ignores any size suffix, so
    /// `varchar(255)` and `VARCHAR` both map to [`SqlType::String`].
    /// Unknown names are kept as [`SqlType::Other`].
    pub fn from_declared(declared: &str) -> Self {
        let base = declared
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "VARCHAR" | "CHAR" | "CHARACTER" | "CHARACTER VARYING" | "NVARCHAR" | "NCHAR"
            | "STRING" => SqlType::String,
            "TEXT" | "CLOB" | "LONGVARCHAR" | "LONGTEXT" | "MEDIUMTEXT" => SqlType::Text,
            "INT" | "INTEGER" | "INT4" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "INT2" => {
                SqlType::Int
            }
            "BIGINT" | "INT8" | "LONG" => SqlType::Long,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" | "REAL" => SqlType::Double,
            "BOOL" | "BOOLEAN" => SqlType::Bool,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "TIMESTAMP WITH TIME ZONE" => {
                SqlType::Timestamp
            }
            "DATE" => SqlType::Date,
            "BLOB" | "BINARY" | "VARBINARY" | "BYTEA" | "LONGVARBINARY" => SqlType::Binary,
            _ => SqlType::Other(base),
        }
    }

    /// Canonical upper-case name of the tag
    pub fn name(&self) -> &str {
        match self {
            SqlType::String => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Int => "INTEGER",
            SqlType::Long => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Bool => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Date => "DATE",
            SqlType::Binary => "BINARY",
            SqlType::Other(name) => name,
        }
    }

    /// Whether values of this type are carried as [`Value::Timestamp`]
    pub fn is_temporal(&self) -> bool {
        matches!(self, SqlType::Timestamp | SqlType::Date)
    }

    /// Whether values of this type are carried as [`Value::String`]
    pub fn is_textual(&self) -> bool {
        matches!(self, SqlType::String | SqlType::Text)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A database value as seen by callers of a pooled connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Character data
    String(String),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// Double precision floating point
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Date-time with the offset it was created in
    Timestamp(DateTime<FixedOffset>),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Long(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as a date-time
    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as raw bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Timestamp(_) => "timestamp",
            Value::Binary(_) => "binary",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Binary(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Binary(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Reconstruct a UTC date-time from epoch milliseconds.
///
/// Returns `None` when the instant is outside chrono's representable range.
pub fn timestamp_from_millis(millis: i64) -> Option<DateTime<FixedOffset>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.fixed_offset())
}

/// A positional query parameter: a declared type tag paired with a value
///
/// A [`Value::Null`] under any tag binds as a typed SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    sql_type: SqlType,
    value: Value,
}

impl Param {
    /// Pair a tag with a value
    pub fn new(sql_type: SqlType, value: impl Into<Value>) -> Self {
        Self {
            sql_type,
            value: value.into(),
        }
    }

    /// A typed NULL
    pub fn null(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            value: Value::Null,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(SqlType::String, value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(SqlType::Text, value.into())
    }

    pub fn int(value: i32) -> Self {
        Self::new(SqlType::Int, value)
    }

    pub fn long(value: i64) -> Self {
        Self::new(SqlType::Long, value)
    }

    pub fn double(value: f64) -> Self {
        Self::new(SqlType::Double, value)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(SqlType::Bool, value)
    }

    pub fn timestamp<Tz: TimeZone>(value: DateTime<Tz>) -> Self {
        Self::new(SqlType::Timestamp, value.fixed_offset())
    }

    pub fn date<Tz: TimeZone>(value: DateTime<Tz>) -> Self {
        Self::new(SqlType::Date, value.fixed_offset())
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self::new(SqlType::Binary, value.into())
    }

    /// Declared type tag
    pub fn sql_type(&self) -> &SqlType {
        &self.sql_type
    }

    /// Bound value
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A result row: one value per column, in select-list order
pub type Row = Vec<Value>;

/// Rows returned by a query, in the order the driver produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given column names
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create an empty table with room for `capacity` rows
    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append a row
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at (row, column), both 0-based
    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// First column of the first row, if any
    pub fn first_value(&self) -> Option<&Value> {
        self.get(0, 0)
    }

    /// Iterate over rows
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Consume the table, returning its rows
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl std::fmt::Display for Table {
    /// One line per row, values separated by tabs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}
