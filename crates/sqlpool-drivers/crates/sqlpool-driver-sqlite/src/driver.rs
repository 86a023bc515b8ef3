//! SQLite driver implementation

use async_trait::async_trait;
use sqlpool_core::{Credentials, Driver, PoolSettings, RawConnection, Result, SqlPoolError};

use crate::SqliteConnection;
use crate::connection::is_memory_path;

/// SQLite database driver
///
/// The connection string is the database file path. A pool needs every
/// connection on the same database, so a private `:memory:` database is
/// refused; a named shared-cache URI such as
/// `file:app?mode=memory&cache=shared` is accepted. Credentials are ignored.
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn build_connection_string(&self, settings: &PoolSettings) -> String {
        settings.database.clone()
    }

    fn validate_settings(&self, settings: &PoolSettings) -> Result<()> {
        let database = settings.database.trim();
        if database.is_empty() {
            return Err(SqlPoolError::Configuration(
                "SQLite pools need a database path".into(),
            ));
        }
        if is_memory_path(database) && !database.contains("cache=shared") {
            return Err(SqlPoolError::Configuration(format!(
                "SQLite database '{}' would be private to each pooled connection; \
                 use a file path or a shared-cache URI",
                database
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, _credentials))]
    async fn open(
        &self,
        connection_string: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RawConnection>> {
        let conn = SqliteConnection::open(connection_string).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            SqlPoolError::Connectivity(format!("Failed to connect to SQLite database: {}", e))
        })?;

        Ok(Box::new(conn))
    }
}
