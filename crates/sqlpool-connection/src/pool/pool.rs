//! Connection pool implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sqlpool_core::{Credentials, Driver, PoolSettings, Result, SqlPoolError};
use sqlpool_drivers::DriverRegistry;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::reaper;
use super::stats::PoolStats;
use crate::PooledConnection;

/// State shared between pool handles and the reclamation task
pub(super) struct PoolInner {
    settings: PoolSettings,
    driver: Arc<dyn Driver>,
    connection_string: String,
    credentials: Credentials,
    /// Creation order. Every membership change and every scan-then-claim
    /// happens while this lock is held.
    connections: Mutex<Vec<Arc<PooledConnection>>>,
    opened: AtomicU64,
    evicted: AtomicU64,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    manager: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PoolInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Open and wrap one raw connection with auto-commit disabled
    async fn open_connection(&self) -> Result<Arc<PooledConnection>> {
        let raw = self
            .driver
            .open(&self.connection_string, &self.credentials)
            .await
            .map_err(|e| match e {
                SqlPoolError::Connectivity(_) => e,
                other => SqlPoolError::Connectivity(other.to_string()),
            })?;

        if let Err(e) = raw.set_auto_commit(false).await {
            if let Err(close_err) = raw.close().await {
                tracing::warn!(error = %close_err, "failed to close rejected connection");
            }
            return Err(SqlPoolError::Connectivity(format!(
                "Failed to disable auto-commit: {}",
                e
            )));
        }

        let id = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(connection_id = id, "opened raw connection");
        Ok(Arc::new(PooledConnection::new(id, raw)))
    }

    /// Evict invalid and stale connections, returning how many were removed
    pub(super) async fn sweep(&self) -> usize {
        let mut connections = self.connections.lock().await;
        if self.is_closed() {
            return 0;
        }

        let validation_timeout = self.settings.validation_timeout();
        let stale_timeout = self.settings.stale_timeout();
        let mut evicted = 0;
        let mut index = 0;

        while index < connections.len() {
            let conn = &connections[index];
            let stale = conn
                .claimed_since()
                .is_some_and(|since| since.elapsed() > stale_timeout);
            if !stale && conn.is_valid(validation_timeout).await {
                index += 1;
                continue;
            }

            let conn = connections.remove(index);
            tracing::warn!(connection_id = conn.id(), stale, "evicting pooled connection");
            conn.discard().await;
            evicted += 1;
        }

        self.evicted.fetch_add(evicted as u64, Ordering::SeqCst);
        tracing::debug!(
            evicted,
            remaining = connections.len(),
            "reclamation sweep finished"
        );
        evicted
    }
}

/// A pool of database connections that grows on demand
///
/// `ConnectionPool` is a cheap handle; clones share the same connections and
/// reclamation task. Connections are returned explicitly with
/// [`ConnectionPool::release`]; one left claimed past the stale timeout is
/// treated as abandoned and evicted by the next sweep.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Resolve the configured driver and open the pool
    ///
    /// Fails with [`SqlPoolError::DriverUnavailable`] if no driver with the
    /// configured name is registered.
    pub async fn create(settings: PoolSettings, registry: &DriverRegistry) -> Result<Self> {
        settings.validate()?;
        let driver = registry.resolve(&settings.driver)?;
        Self::with_driver(settings, driver).await
    }

    /// Open the pool on an explicit driver
    ///
    /// Opens exactly `pool_size` connections, disables auto-commit on each
    /// and starts the reclamation task. If any open fails, the connections
    /// opened so far are closed and the error is returned.
    #[tracing::instrument(skip_all, fields(driver = %driver.name(), pool_size = settings.pool_size))]
    pub async fn with_driver(settings: PoolSettings, driver: Arc<dyn Driver>) -> Result<Self> {
        settings.validate()?;
        driver.validate_settings(&settings)?;

        let connection_string = driver.build_connection_string(&settings);
        let credentials = settings.credentials();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let pool_size = settings.pool_size;
        let sweep_interval = settings.sweep_interval();

        let inner = Arc::new(PoolInner {
            settings,
            driver,
            connection_string,
            credentials,
            connections: Mutex::new(Vec::with_capacity(pool_size)),
            opened: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            shutdown,
            manager: parking_lot::Mutex::new(None),
        });

        {
            let mut connections = inner.connections.lock().await;
            for _ in 0..pool_size {
                match inner.open_connection().await {
                    Ok(conn) => connections.push(conn),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            opened = connections.len(),
                            "failed to fill connection pool"
                        );
                        for conn in connections.drain(..) {
                            conn.close_quietly().await;
                        }
                        inner.closed.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                }
            }
        }

        let handle = tokio::spawn(reaper::run(
            Arc::downgrade(&inner),
            sweep_interval,
            shutdown_rx,
        ));
        *inner.manager.lock() = Some(handle);

        tracing::info!(
            connection_string = %inner.connection_string,
            ?sweep_interval,
            "connection pool created"
        );
        Ok(Self { inner })
    }

    /// Claim the first free and valid connection, growing the pool if none
    ///
    /// Never waits for a connection to be released. Fails with a
    /// connectivity error only if growth is needed and opening fails.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self) -> Result<Arc<PooledConnection>> {
        let mut connections = self.inner.connections.lock().await;
        if self.inner.is_closed() {
            return Err(SqlPoolError::PoolClosed);
        }

        let validation_timeout = self.inner.settings.validation_timeout();
        for conn in connections.iter() {
            if conn.is_claimed() || !conn.is_valid(validation_timeout).await {
                continue;
            }
            if conn.try_claim() {
                tracing::debug!(connection_id = conn.id(), "claimed pooled connection");
                return Ok(Arc::clone(conn));
            }
        }

        let conn = self.inner.open_connection().await?;
        conn.try_claim();
        connections.push(Arc::clone(&conn));
        tracing::info!(
            connection_id = conn.id(),
            total = connections.len(),
            "no free connection, pool grew"
        );
        Ok(conn)
    }

    /// Return a connection to the free set
    pub fn release(&self, conn: &PooledConnection) {
        conn.release();
        tracing::debug!(connection_id = conn.id(), "released pooled connection");
    }

    /// Run one reclamation sweep now, returning the number of evictions
    pub async fn reclaim(&self) -> usize {
        self.inner.sweep().await
    }

    /// Stop the reclamation task and close every connection
    ///
    /// Close failures are logged and ignored. Calling `destroy` again is a
    /// no-op; `acquire` on a destroyed pool fails with
    /// [`SqlPoolError::PoolClosed`].
    #[tracing::instrument(skip(self))]
    pub async fn destroy(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("connection pool already destroyed");
            return;
        }

        // Wakes the task if it is sleeping; it is not joined.
        self.inner.shutdown.send_replace(true);

        let connections = std::mem::take(&mut *self.inner.connections.lock().await);
        let count = connections.len();
        for conn in connections {
            conn.close_quietly().await;
        }

        tracing::info!(closed = count, "connection pool destroyed");
    }

    /// Get current pool statistics
    pub async fn stats(&self) -> PoolStats {
        let connections = self.inner.connections.lock().await;
        let active = connections.iter().filter(|c| c.is_claimed()).count();
        PoolStats::new(connections.len(), connections.len() - active, active).with_counters(
            self.inner.opened.load(Ordering::SeqCst),
            self.inner.evicted.load(Ordering::SeqCst),
        )
    }

    /// Whether `destroy` has not run yet
    pub fn is_active(&self) -> bool {
        !self.inner.is_closed()
    }

    /// Whether the reclamation task is still running
    pub fn is_manager_running(&self) -> bool {
        self.inner
            .manager
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Connection string built from the settings at creation
    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &self.inner.driver.name())
            .field("connection_string", &self.inner.connection_string)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
