//! In-memory driver used by the unit tests
//!
//! Every opened connection shares a [`MockState`] with the driver, so tests
//! can flip validity, inject failures and inspect the calls a pooled
//! connection made on its raw connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlpool_core::{
    BindValue, Credentials, Driver, KeyRetrieval, RawConnection, RawRows, Result, SqlPoolError,
    Statement,
};

pub(crate) struct MockState {
    valid: AtomicBool,
    validity_error: AtomicBool,
    validity_hangs: AtomicBool,
    auto_commit: AtomicBool,
    closed: AtomicBool,
    fail_execute: AtomicBool,
    fail_rollback: AtomicBool,
    events: Mutex<Vec<String>>,
    binds: Mutex<Vec<(usize, BindValue)>>,
    rows: Mutex<RawRows>,
    keys: Mutex<Vec<i64>>,
    statements_opened: AtomicUsize,
    statements_closed: AtomicUsize,
}

impl MockState {
    fn new() -> Self {
        Self {
            valid: AtomicBool::new(true),
            validity_error: AtomicBool::new(false),
            validity_hangs: AtomicBool::new(false),
            auto_commit: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            fail_execute: AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
            binds: Mutex::new(Vec::new()),
            rows: Mutex::new(RawRows::default()),
            keys: Mutex::new(Vec::new()),
            statements_opened: AtomicUsize::new(0),
            statements_closed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub(crate) fn set_validity_error(&self, error: bool) {
        self.validity_error.store(error, Ordering::SeqCst);
    }

    pub(crate) fn set_validity_hangs(&self, hangs: bool) {
        self.validity_hangs.store(hangs, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_rows(&self, rows: RawRows) {
        *self.rows.lock() = rows;
    }

    pub(crate) fn set_keys(&self, keys: Vec<i64>) {
        *self.keys.lock() = keys;
    }

    pub(crate) fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub(crate) fn binds(&self) -> Vec<(usize, BindValue)> {
        self.binds.lock().clone()
    }

    pub(crate) fn statements_opened(&self) -> usize {
        self.statements_opened.load(Ordering::SeqCst)
    }

    pub(crate) fn statements_closed(&self) -> usize {
        self.statements_closed.load(Ordering::SeqCst)
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

pub(crate) struct MockConnection {
    state: Arc<MockState>,
}

impl MockConnection {
    pub(crate) fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::new());
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
        if self.state.validity_hangs.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.state.validity_error.load(Ordering::SeqCst) {
            return Err(SqlPoolError::Connectivity("validity check failed".into()));
        }
        Ok(self.state.valid.load(Ordering::SeqCst) && !self.state.is_closed())
    }

    async fn prepare(&self, sql: &str, keys: KeyRetrieval) -> Result<Box<dyn Statement>> {
        if self.state.is_closed() {
            return Err(SqlPoolError::Statement("connection is closed".into()));
        }
        if sql.contains("syntax error") {
            return Err(SqlPoolError::Statement("near \"syntax\"".into()));
        }
        self.state.statements_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStatement {
            state: Arc::clone(&self.state),
            sql: sql.to_string(),
            keys,
        }))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.state.auto_commit.store(auto_commit, Ordering::SeqCst);
        self.state.record(format!("set_auto_commit({})", auto_commit));
        Ok(())
    }

    async fn auto_commit(&self) -> Result<bool> {
        Ok(self.state.auto_commit())
    }

    async fn commit(&self) -> Result<()> {
        self.state.record("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.state.record("rollback");
        if self.state.fail_rollback.load(Ordering::SeqCst) {
            return Err(SqlPoolError::Transaction("rollback failed".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.record("close");
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

struct MockStatement {
    state: Arc<MockState>,
    sql: String,
    keys: KeyRetrieval,
}

#[async_trait]
impl Statement for MockStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> Result<()> {
        self.state.binds.lock().push((index, value));
        Ok(())
    }

    async fn execute(&mut self) -> Result<u64> {
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(SqlPoolError::Statement("execute failed".into()));
        }
        self.state.record(format!("execute {}", self.sql));
        Ok(1)
    }

    async fn execute_query(&mut self) -> Result<RawRows> {
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(SqlPoolError::Statement("query failed".into()));
        }
        self.state.record(format!("query {}", self.sql));
        Ok(self.state.rows.lock().clone())
    }

    async fn generated_keys(&mut self) -> Result<Vec<i64>> {
        if self.keys != KeyRetrieval::Generated {
            return Err(SqlPoolError::Statement("keys not requested".into()));
        }
        Ok(self.state.keys.lock().clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.statements_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Driver handing out [`MockConnection`]s and remembering their state
pub(crate) struct MockDriver {
    opened: Mutex<Vec<Arc<MockState>>>,
    fail_from: Mutex<Option<usize>>,
    connection_strings: Mutex<Vec<String>>,
}

impl MockDriver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            fail_from: Mutex::new(None),
            connection_strings: Mutex::new(Vec::new()),
        })
    }

    /// Make every open after the first `count` successful ones fail
    pub(crate) fn fail_after(&self, count: usize) {
        *self.fail_from.lock() = Some(count);
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.lock().len()
    }

    pub(crate) fn connection(&self, index: usize) -> Arc<MockState> {
        Arc::clone(&self.opened.lock()[index])
    }

    pub(crate) fn connection_strings(&self) -> Vec<String> {
        self.connection_strings.lock().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(
        &self,
        connection_string: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RawConnection>> {
        self.connection_strings
            .lock()
            .push(connection_string.to_string());

        let mut opened = self.opened.lock();
        if let Some(limit) = *self.fail_from.lock()
            && opened.len() >= limit
        {
            return Err(SqlPoolError::Connectivity("connection refused".into()));
        }

        let (conn, state) = MockConnection::new();
        opened.push(state);
        Ok(Box::new(conn))
    }
}
