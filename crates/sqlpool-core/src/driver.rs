//! Database driver trait definition

use crate::{PoolSettings, RawConnection, Result};
use async_trait::async_trait;

/// Login credentials passed to [`Driver::open`]
#[derive(Clone, Default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait Driver: Send + Sync {
    /// Unique identifier for this driver (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Build the connection string from host, port and database name
    fn build_connection_string(&self, settings: &PoolSettings) -> String {
        format!(
            "{}://{}:{}/{}",
            self.name(),
            settings.host,
            settings.port,
            settings.database
        )
    }

    /// Reject settings under which pooled connections would not share one
    /// database
    fn validate_settings(&self, _settings: &PoolSettings) -> Result<()> {
        Ok(())
    }

    /// Open a new raw connection
    async fn open(
        &self,
        connection_string: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RawConnection>>;
}
