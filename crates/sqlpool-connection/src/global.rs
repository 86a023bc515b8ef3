//! Process-wide pool slot
//!
//! For applications that want one shared pool without threading a handle
//! through every call site. The slot is either absent or holds one active
//! [`ConnectionPool`]; only [`create`] fills it and only [`destroy`] empties
//! it. Both run under the slot's lock, so a concurrent `create` observes the
//! pool the first one installed and opens nothing.

use std::sync::Arc;

use sqlpool_core::{PoolSettings, Result, SqlPoolError};
use sqlpool_drivers::DriverRegistry;
use tokio::sync::Mutex;

use crate::{ConnectionPool, PooledConnection};

static POOL: Mutex<Option<ConnectionPool>> = Mutex::const_new(None);

/// Create the shared pool, or return the existing one unchanged
pub async fn create(settings: PoolSettings, registry: &DriverRegistry) -> Result<ConnectionPool> {
    let mut slot = POOL.lock().await;
    if let Some(pool) = slot.as_ref() {
        tracing::debug!("shared pool already active");
        return Ok(pool.clone());
    }

    let pool = ConnectionPool::create(settings, registry).await?;
    *slot = Some(pool.clone());
    Ok(pool)
}

/// Handle to the shared pool; [`SqlPoolError::PoolClosed`] when absent
pub async fn get() -> Result<ConnectionPool> {
    POOL.lock().await.clone().ok_or(SqlPoolError::PoolClosed)
}

/// Acquire a connection from the shared pool
pub async fn acquire() -> Result<Arc<PooledConnection>> {
    get().await?.acquire().await
}

/// Release a connection to the shared pool
pub async fn release(conn: &PooledConnection) {
    match get().await {
        Ok(pool) => pool.release(conn),
        Err(_) => conn.release(),
    }
}

/// Destroy the shared pool and empty the slot. No-op when absent.
pub async fn destroy() {
    let mut slot = POOL.lock().await;
    if let Some(pool) = slot.take() {
        pool.destroy().await;
    }
}

pub async fn is_active() -> bool {
    POOL.lock().await.is_some()
}
