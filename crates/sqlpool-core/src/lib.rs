//! sqlpool core - shared abstractions for the connection pool
//!
//! This crate provides the types every other sqlpool crate depends on:
//!
//! - `Driver`, `RawConnection`, `Statement` - the driver boundary
//! - `SqlType`, `Value`, `Param`, `Table` - the typed value model
//! - `PoolSettings` - read-only pool configuration
//! - `SqlPoolError` - the error taxonomy

mod connection;
mod driver;
mod error;
mod settings;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use settings::*;
pub use types::*;
