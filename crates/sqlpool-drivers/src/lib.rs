//! sqlpool drivers - concrete database driver implementations
//!
//! Drivers are feature-gated and collected in a [`DriverRegistry`] that the
//! pool resolves its configured driver name against.

#[cfg(feature = "sqlite")]
pub use sqlpool_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from sqlpool-core
pub use sqlpool_core::{Driver, PoolSettings, RawConnection, Result, SqlPoolError};
