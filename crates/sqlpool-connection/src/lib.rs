//! sqlpool connection - pooled connections and the connection pool
//!
//! This crate owns connection lifecycle: claiming and releasing connections,
//! typed statement execution on a claimed connection, growth on demand and
//! background reclamation of invalid or abandoned connections.

mod connection;
pub mod global;
mod marshal;
pub mod pool;

#[cfg(test)]
mod test_support;

pub use connection::{ConnectionState, PooledConnection};
pub use pool::{ConnectionPool, PoolStats};
