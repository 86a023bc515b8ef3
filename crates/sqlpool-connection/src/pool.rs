//! Connection pooling for database connections
//!
//! The pool opens a fixed number of connections up front, hands out the
//! first free and valid one on `acquire`, and grows by one connection when
//! none qualifies. A background task periodically evicts connections that
//! fail their validity check or have been claimed past the stale timeout.
//!
//! # Example
//!
//! ```ignore
//! use sqlpool_connection::ConnectionPool;
//! use sqlpool_core::{Param, PoolSettings};
//! use sqlpool_drivers::DriverRegistry;
//!
//! let settings = PoolSettings::load("sqlpool.toml")?;
//! let pool = ConnectionPool::create(settings, &DriverRegistry::with_defaults()).await?;
//!
//! let conn = pool.acquire().await?;
//! let table = conn.query("SELECT x FROM t WHERE id = ?", &[Param::int(1)]).await?;
//! conn.commit().await?;
//! pool.release(&conn);
//!
//! pool.destroy().await;
//! ```

mod pool;
mod reaper;
mod stats;


pub use pool::ConnectionPool;
pub use stats::PoolStats;
