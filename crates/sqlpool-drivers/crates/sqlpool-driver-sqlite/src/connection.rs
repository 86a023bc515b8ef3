//! SQLite connection implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use sqlpool_core::{
    BindValue, Cell, ColumnInfo, KeyRetrieval, RawConnection, RawRows, Result, SqlPoolError,
    SqlType, Statement,
};

type SharedConnection = Arc<Mutex<Option<RusqliteConnection>>>;

fn closed_error() -> SqlPoolError {
    SqlPoolError::Statement("SQLite connection is closed".into())
}

/// SQLite connection wrapper
///
/// SQLite has no server-side auto-commit switch, so manual-commit mode is
/// emulated: turning auto-commit off opens a deferred transaction, and every
/// commit or rollback immediately opens the next one.
pub struct SqliteConnection {
    conn: SharedConnection,
    auto_commit: AtomicBool,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                SqlPoolError::Connectivity(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:")
                && let Some(parent) = std::path::Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                return Err(SqlPoolError::Connectivity(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;

            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                SqlPoolError::Connectivity(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            SqlPoolError::Connectivity(format!("Failed to enable foreign keys: {}", e))
        })?;

        // Readers left inside a deferred transaction must not block commits
        // from other pooled connections.
        if !is_memory_path(path) {
            conn.pragma_update(None, "journal_mode", "WAL").map_err(|e| {
                SqlPoolError::Connectivity(format!("Failed to enable WAL mode: {}", e))
            })?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            auto_commit: AtomicBool::new(true),
        })
    }

    fn run_batch(&self, sql: &str) -> Result<()> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        conn.execute_batch(sql)
            .map_err(|e| SqlPoolError::Transaction(format!("Failed to run {}: {}", sql, e)))
    }

    /// End the open transaction with `verb` and start the next one
    fn finish_transaction(&self, verb: &str) -> Result<()> {
        if self.auto_commit.load(Ordering::SeqCst) {
            return Err(SqlPoolError::Transaction(format!(
                "Cannot {} while auto-commit is enabled",
                verb.to_lowercase()
            )));
        }

        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        if !conn.is_autocommit() {
            conn.execute_batch(verb).map_err(|e| {
                SqlPoolError::Transaction(format!("Failed to {}: {}", verb.to_lowercase(), e))
            })?;
        }
        conn.execute_batch("BEGIN DEFERRED").map_err(|e| {
            SqlPoolError::Transaction(format!("Failed to begin transaction: {}", e))
        })
    }
}

#[async_trait]
impl RawConnection for SqliteConnection {
    async fn is_valid(&self, timeout: Duration) -> Result<bool> {
        let guard = self.conn.lock();
        let Some(conn) = guard.as_ref() else {
            return Ok(false);
        };

        // `timeout` is enforced by the caller; the connection's busy timeout
        // stays as configured.
        tracing::trace!(?timeout, "checking SQLite connection");
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| SqlPoolError::Statement(e.to_string()))?;
        Ok(one == 1)
    }

    async fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement>> {
        {
            let guard = self.conn.lock();
            let conn = guard.as_ref().ok_or_else(closed_error)?;
            // Surface syntax errors at prepare time rather than on execute.
            conn.prepare_cached(sql)
                .map_err(|e| SqlPoolError::Statement(format!("Failed to prepare: {}", e)))?;
        }

        Ok(Box::new(SqliteStatement {
            conn: Arc::clone(&self.conn),
            sql: sql.to_string(),
            params: Vec::new(),
            keys,
            generated: Vec::new(),
        }))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        let was = self.auto_commit.swap(auto_commit, Ordering::SeqCst);
        if was == auto_commit {
            return Ok(());
        }

        let outcome = if auto_commit {
            let guard = self.conn.lock();
            let conn = guard.as_ref().ok_or_else(closed_error)?;
            if conn.is_autocommit() {
                Ok(())
            } else {
                conn.execute_batch("COMMIT").map_err(|e| {
                    SqlPoolError::Transaction(format!("Failed to commit: {}", e))
                })
            }
        } else {
            self.run_batch("BEGIN DEFERRED")
        };

        if outcome.is_err() {
            self.auto_commit.store(was, Ordering::SeqCst);
        }
        tracing::debug!(auto_commit, "SQLite auto-commit changed");
        outcome
    }

    async fn auto_commit(&self) -> Result<bool> {
        if self.is_closed() {
            return Err(closed_error());
        }
        Ok(self.auto_commit.load(Ordering::SeqCst))
    }

    async fn commit(&self) -> Result<()> {
        self.finish_transaction("COMMIT")
    }

    async fn rollback(&self) -> Result<()> {
        self.finish_transaction("ROLLBACK")
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => {
                tracing::info!("closing SQLite connection");
                conn.close().map_err(|(_, e)| {
                    SqlPoolError::Connectivity(format!("Failed to close SQLite connection: {}", e))
                })
            }
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// A statement prepared on a [`SqliteConnection`]
///
/// Parameters are collected on `bind` and applied when the statement runs,
/// so the statement does not hold the connection lock between calls.
pub struct SqliteStatement {
    conn: SharedConnection,
    sql: String,
    params: Vec<SqliteValue>,
    keys: KeyRetrieval,
    generated: Vec<i64>,
}

impl SqliteStatement {
    fn is_insert(&self) -> bool {
        let head = self.sql.trim_start().to_ascii_uppercase();
        head.starts_with("INSERT") || head.starts_with("REPLACE")
    }
}

#[async_trait]
impl Statement for SqliteStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> Result<()> {
        if index == 0 {
            return Err(SqlPoolError::Statement(
                "Parameter indexes start at 1".into(),
            ));
        }
        if self.params.len() < index {
            self.params.resize(index, SqliteValue::Null);
        }
        self.params[index - 1] = bind_to_sqlite(value);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(sql_preview = %self.sql.chars().take(100).collect::<String>()))]
    async fn execute(&mut self) -> Result<u64> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        let mut stmt = conn
            .prepare_cached(&self.sql)
            .map_err(|e| SqlPoolError::Statement(format!("Failed to prepare: {}", e)))?;

        let affected = if stmt.column_count() > 0 {
            // Row-producing statement run for its side effects; drain and discard.
            let mut rows = stmt
                .query(params_from_iter(self.params.iter()))
                .map_err(|e| SqlPoolError::Statement(format!("Failed to execute: {}", e)))?;
            while rows
                .next()
                .map_err(|e| SqlPoolError::Statement(format!("Failed to fetch row: {}", e)))?
                .is_some()
            {}
            drop(rows);
            // `INSERT ... RETURNING` produces rows and still changes the table.
            if stmt.readonly() {
                0
            } else {
                u64::try_from(conn.changes()).unwrap_or(u64::MAX)
            }
        } else {
            stmt.execute(params_from_iter(self.params.iter()))
                .map_err(|e| SqlPoolError::Statement(format!("Failed to execute: {}", e)))?
                as u64
        };

        self.generated.clear();
        if self.keys == KeyRetrieval::Generated && affected > 0 && self.is_insert() {
            self.generated.push(conn.last_insert_rowid());
        }

        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(affected)
    }

    #[tracing::instrument(skip(self), fields(sql_preview = %self.sql.chars().take(100).collect::<String>()))]
    async fn execute_query(&mut self) -> Result<RawRows> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or_else(closed_error)?;
        let mut stmt = conn
            .prepare_cached(&self.sql)
            .map_err(|e| SqlPoolError::Statement(format!("Failed to prepare: {}", e)))?;

        // Declared types come from CREATE TABLE via sqlite3_column_decltype.
        let declared: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), col.decl_type().map(str::to_string)))
            .collect();

        let mut rows = Vec::new();
        let mut query_rows = stmt
            .query(params_from_iter(self.params.iter()))
            .map_err(|e| SqlPoolError::Statement(format!("Failed to execute query: {}", e)))?;

        while let Some(row) = query_rows
            .next()
            .map_err(|e| SqlPoolError::Statement(format!("Failed to fetch row: {}", e)))?
        {
            let mut cells = Vec::with_capacity(declared.len());
            for idx in 0..declared.len() {
                let value_ref = row
                    .get_ref(idx)
                    .map_err(|e| SqlPoolError::Statement(e.to_string()))?;
                cells.push(sqlite_to_cell(value_ref));
            }
            rows.push(cells);
        }

        // Expression columns have no declared type; report the storage
        // class of the first row instead.
        let columns = declared
            .into_iter()
            .enumerate()
            .map(|(idx, (name, decl))| {
                let sql_type = match decl {
                    Some(decl) => SqlType::from_declared(&decl),
                    None => rows
                        .first()
                        .map(|row: &Vec<Cell>| storage_class(&row[idx]))
                        .unwrap_or_else(|| SqlType::Other("NULL".into())),
                };
                ColumnInfo { name, sql_type }
            })
            .collect();

        tracing::debug!(row_count = rows.len(), "query executed successfully");
        Ok(RawRows { columns, rows })
    }

    async fn generated_keys(&mut self) -> Result<Vec<i64>> {
        if self.keys != KeyRetrieval::Generated {
            return Err(SqlPoolError::Statement(
                "Statement was not prepared to return generated keys".into(),
            ));
        }
        Ok(self.generated.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::trace!("SQLite statement closed");
        Ok(())
    }
}

fn bind_to_sqlite(value: BindValue) -> SqliteValue {
    match value {
        BindValue::Null(_) => SqliteValue::Null,
        BindValue::Text(s) => SqliteValue::Text(s),
        BindValue::Int(i) => SqliteValue::Integer(i as i64),
        BindValue::Long(i) => SqliteValue::Integer(i),
        BindValue::Double(f) => SqliteValue::Real(f),
        BindValue::Bool(b) => SqliteValue::Integer(if b { 1 } else { 0 }),
        // SQLite has no timestamp storage class; epoch millis keep the instant.
        BindValue::Timestamp { millis, .. } => SqliteValue::Integer(millis),
        BindValue::Bytes(b) => SqliteValue::Blob(b),
    }
}

fn sqlite_to_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(f) => Cell::Real(f),
        ValueRef::Text(s) => Cell::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
    }
}

/// Whether `path` names a private in-memory database
pub(crate) fn is_memory_path(path: &str) -> bool {
    path == ":memory:" || path.contains("mode=memory")
}

fn storage_class(cell: &Cell) -> SqlType {
    match cell {
        Cell::Integer(_) => SqlType::Long,
        Cell::Real(_) => SqlType::Double,
        Cell::Text(_) => SqlType::Text,
        Cell::Blob(_) => SqlType::Binary,
        Cell::Bool(_) => SqlType::Bool,
        Cell::Timestamp(_) => SqlType::Timestamp,
        Cell::Null => SqlType::Other("NULL".into()),
    }
}
