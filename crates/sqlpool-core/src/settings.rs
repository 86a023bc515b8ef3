//! Pool settings
//!
//! Read-only configuration consumed when a pool is created: where the server
//! lives, how to log in, how many connections to open up front, and the
//! timing of the background reclamation sweep.
//!
//! # Example
//!
//! ```
//! use sqlpool_core::PoolSettings;
//!
//! let settings = PoolSettings::from_toml_str(r#"
//!     driver = "sqlite"
//!     database = "app.db"
//!     pool_size = 2
//! "#).unwrap();
//!
//! assert_eq!(settings.pool_size, 2);
//! assert_eq!(settings.sweep_interval().as_secs(), 600);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Credentials, Result, SqlPoolError};

const DEFAULT_POOL_SIZE: usize = 5;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
const DEFAULT_STALE_TIMEOUT_SECS: u64 = 100 * 60;
const DEFAULT_VALIDATION_TIMEOUT_MS: u64 = 5_000;

/// Settings for a connection pool
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Driver name as registered in the driver registry (e.g. "sqlite")
    pub driver: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name, or file path for file-based databases
    pub database: String,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
    /// Number of connections opened when the pool is created
    pub pool_size: usize,
    /// Seconds between reclamation sweeps
    pub sweep_interval_secs: u64,
    /// Seconds a connection may stay claimed before it counts as abandoned
    pub stale_timeout_secs: u64,
    /// Milliseconds a liveness check may take
    pub validation_timeout_ms: u64,
}

impl PoolSettings {
    /// Create settings for the given driver with default sizing and timing
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    /// Parse settings from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading pool settings");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Reject settings a pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.driver.trim().is_empty() {
            return Err(SqlPoolError::Configuration(
                "driver name must not be empty".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(SqlPoolError::Configuration(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.stale_timeout_secs == 0 {
            return Err(SqlPoolError::Configuration(
                "stale_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.validation_timeout_ms == 0 {
            return Err(SqlPoolError::Configuration(
                "validation_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        self
    }

    /// Login credentials
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }

    /// Interval between reclamation sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// How long a connection may stay claimed before eviction
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }

    /// Liveness check timeout
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

impl Default for PoolSettings {
    /// Defaults:
    /// - pool_size: 5
    /// - sweep interval: 10 minutes
    /// - stale timeout: 100 minutes
    /// - validation timeout: 5 seconds
    fn default() -> Self {
        Self {
            driver: String::new(),
            host: "localhost".to_string(),
            port: 0,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            pool_size: DEFAULT_POOL_SIZE,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            stale_timeout_secs: DEFAULT_STALE_TIMEOUT_SECS,
            validation_timeout_ms: DEFAULT_VALIDATION_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for PoolSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSettings")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("pool_size", &self.pool_size)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("stale_timeout_secs", &self.stale_timeout_secs)
            .field("validation_timeout_ms", &self.validation_timeout_ms)
            .finish_non_exhaustive()
    }
}
