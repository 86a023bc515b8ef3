//! Raw connection and statement traits consumed from drivers

use crate::{Result, SqlType};
use async_trait::async_trait;
use std::time::Duration;

/// An encoded parameter handed to [`Statement::bind`]
///
/// Produced from a typed `Param` by the pooled connection; drivers only
/// translate it to their native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// Typed SQL NULL
    Null(SqlType),
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    /// Epoch milliseconds plus the UTC offset of the calendar it came from
    Timestamp { millis: i64, offset_seconds: i32 },
    Bytes(Vec<u8>),
}

/// A result cell as the driver produced it, before type-directed decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    /// Epoch milliseconds
    Timestamp(i64),
}

impl Cell {
    /// Best-effort string form used for columns without a read rule
    pub fn to_display_string(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Integer(v) => Some(v.to_string()),
            Cell::Real(v) => Some(v.to_string()),
            Cell::Text(v) => Some(v.clone()),
            Cell::Blob(v) => Some(String::from_utf8_lossy(v).into_owned()),
            Cell::Bool(v) => Some(v.to_string()),
            Cell::Timestamp(v) => Some(v.to_string()),
        }
    }
}

/// Column metadata reported by the driver for a result set
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name or alias
    pub name: String,
    /// Driver-reported column type
    pub sql_type: SqlType,
}

/// A fully materialized result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Cell>>,
}

/// Whether a prepared statement should report generated keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRetrieval {
    #[default]
    None,
    Generated,
}

/// A prepared statement owned by a single call
///
/// Callers bind every parameter, run exactly one of the execute methods, then
/// call [`Statement::close`] on both the success and the failure path.
#[async_trait]
pub trait Statement: Send {
    /// Bind a parameter at a 1-based position
    fn bind(&mut self, index: usize, value: BindValue) -> Result<()>;

    /// Run the statement, returning the affected row count
    async fn execute(&mut self) -> Result<u64>;

    /// Run a row-producing statement
    async fn execute_query(&mut self) -> Result<RawRows>;

    /// Keys generated by the last `execute`, if the statement was prepared
    /// with [`KeyRetrieval::Generated`]
    async fn generated_keys(&mut self) -> Result<Vec<i64>>;

    /// Release the statement's resources
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A live driver-level database session
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// Liveness check. The driver should give up after `timeout`.
    async fn is_valid(&self, timeout: Duration) -> Result<bool>;

    /// Prepare a statement
    async fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement>>;

    /// Switch auto-commit on or off
    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Current auto-commit mode
    async fn auto_commit(&self) -> Result<bool>;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Close the session. Closing an already closed session must succeed.
    async fn close(&self) -> Result<()>;

    /// Check if the session is closed
    fn is_closed(&self) -> bool;
}
