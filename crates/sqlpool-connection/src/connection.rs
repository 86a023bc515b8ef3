//! A raw driver connection wrapped with ownership tracking and typed queries

use std::time::Duration;

use parking_lot::Mutex;
use sqlpool_core::{KeyRetrieval, Param, RawConnection, Result, SqlPoolError, Statement, Table};
use tokio::time::Instant;

use crate::marshal;


/// Ownership state of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Available to the next `acquire`
    Free,
    /// Handed to a caller at `since`
    Claimed { since: Instant },
}

/// One raw connection owned by the pool
///
/// Ownership changes go through [`PooledConnection::try_claim`] and
/// [`PooledConnection::release`]. The pool serializes its scan-then-claim
/// sequence under the pool-wide lock; the per-connection lock here only
/// guards the state transition itself.
pub struct PooledConnection {
    id: u64,
    raw: Box<dyn RawConnection>,
    state: Mutex<ConnectionState>,
}

impl PooledConnection {
    pub(crate) fn new(id: u64, raw: Box<dyn RawConnection>) -> Self {
        Self {
            id,
            raw,
            state: Mutex::new(ConnectionState::Free),
        }
    }

    /// Creation-order identifier, unique within a pool
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Claim the connection.
    ///
    /// Returns `false` without touching the claim time if the connection is
    /// already claimed.
    pub fn try_claim(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Claimed { .. } => false,
            ConnectionState::Free => {
                *state = ConnectionState::Claimed {
                    since: Instant::now(),
                };
                true
            }
        }
    }

    /// Return the connection to the free set.
    ///
    /// Transaction state is left as is; commit or roll back before releasing.
    pub fn release(&self) {
        *self.state.lock() = ConnectionState::Free;
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self.state(), ConnectionState::Claimed { .. })
    }

    /// When the current claim started, if claimed
    pub fn claimed_since(&self) -> Option<Instant> {
        match self.state() {
            ConnectionState::Claimed { since } => Some(since),
            ConnectionState::Free => None,
        }
    }

    /// Check that the raw connection is alive.
    ///
    /// Driver errors, a `false` answer and a check outliving `timeout` all
    /// count as invalid.
    pub async fn is_valid(&self, timeout: Duration) -> bool {
        if self.raw.is_closed() {
            return false;
        }

        match tokio::time::timeout(timeout, self.raw.is_valid(timeout)).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                tracing::debug!(connection_id = self.id, error = %e, "validity check failed");
                false
            }
            Err(_) => {
                tracing::debug!(connection_id = self.id, ?timeout, "validity check timed out");
                false
            }
        }
    }

    /// Run a statement for its side effects, returning the affected row count
    #[tracing::instrument(skip(self, params), fields(connection_id = self.id, params = params.len()))]
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<u64> {
        let mut stmt = self.prepare_bound(sql, params, KeyRetrieval::None).await?;
        let outcome = stmt.execute().await;
        close_statement(stmt).await;

        let affected = outcome?;
        tracing::debug!(affected_rows = affected, "statement executed");
        Ok(affected)
    }

    /// Run a row-producing statement and decode every column by its type
    #[tracing::instrument(skip(self, params), fields(connection_id = self.id, params = params.len()))]
    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Table> {
        let mut stmt = self.prepare_bound(sql, params, KeyRetrieval::None).await?;
        let outcome = stmt.execute_query().await;
        close_statement(stmt).await;

        let table = marshal::decode_rows(outcome?)?;
        tracing::debug!(row_count = table.len(), "query executed");
        Ok(table)
    }

    /// Run an insert-like statement and return the first generated key
    #[tracing::instrument(skip(self, params), fields(connection_id = self.id, params = params.len()))]
    pub async fn execute_returning_key(&self, sql: &str, params: &[Param]) -> Result<i64> {
        let mut stmt = self
            .prepare_bound(sql, params, KeyRetrieval::Generated)
            .await?;
        let outcome = async {
            stmt.execute().await?;
            stmt.generated_keys().await
        }
        .await;
        close_statement(stmt).await;

        let key = outcome?
            .into_iter()
            .next()
            .ok_or_else(|| SqlPoolError::Statement("Statement generated no key".into()))?;
        tracing::debug!(key, "statement generated key");
        Ok(key)
    }

    pub async fn commit(&self) -> Result<()> {
        self.raw.commit().await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.raw.rollback().await
    }

    pub async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.raw.set_auto_commit(auto_commit).await
    }

    pub async fn auto_commit(&self) -> Result<bool> {
        self.raw.auto_commit().await
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_closed()
    }

    /// Roll back any open transaction, then close. Failures are logged only.
    pub(crate) async fn discard(&self) {
        // Unknown auto-commit mode is treated as "may be mid-transaction".
        let needs_rollback = !matches!(self.raw.auto_commit().await, Ok(true));
        if needs_rollback
            && !self.raw.is_closed()
            && let Err(e) = self.raw.rollback().await
        {
            tracing::warn!(connection_id = self.id, error = %e, "rollback before close failed");
        }
        self.close_quietly().await;
    }

    /// Close the raw connection. Failures are logged only.
    pub(crate) async fn close_quietly(&self) {
        if let Err(e) = self.raw.close().await {
            tracing::warn!(connection_id = self.id, error = %e, "failed to close connection");
        }
    }

    async fn prepare_bound(
        &self,
        sql: &str,
        params: &[Param],
        keys: KeyRetrieval,
    ) -> Result<Box<dyn Statement>> {
        let mut stmt = self.raw.prepare(sql, keys).await?;
        if let Err(e) = bind_all(stmt.as_mut(), params) {
            close_statement(stmt).await;
            return Err(e);
        }
        Ok(stmt)
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn bind_all(stmt: &mut dyn Statement, params: &[Param]) -> Result<()> {
    for (index, param) in params.iter().enumerate() {
        stmt.bind(index + 1, marshal::encode(param)?)?;
    }
    Ok(())
}

async fn close_statement(stmt: Box<dyn Statement>) {
    if let Err(e) = stmt.close().await {
        tracing::warn!(error = %e, "failed to close statement");
    }
}
