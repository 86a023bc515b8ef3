//! Error types for sqlpool

use thiserror::Error;

/// Core error type for pool and connection operations
///
/// Validation and teardown failures never show up here: a failed liveness
/// check collapses to "invalid", and rollback/close errors during eviction
/// or shutdown are logged and swallowed.
#[derive(Error, Debug)]
pub enum SqlPoolError {
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SqlPoolError {
    /// Whether the error came from opening a raw connection
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SqlPoolError::Connectivity(_))
    }

    /// Whether the error came from preparing, binding or running a statement
    pub fn is_statement(&self) -> bool {
        matches!(self, SqlPoolError::Statement(_))
    }
}

/// Result type alias for sqlpool operations
pub type Result<T> = std::result::Result<T, SqlPoolError>;
