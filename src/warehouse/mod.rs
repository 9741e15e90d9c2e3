//! Warehouse abstraction layer.
//!
//! Provides a trait-based interface over the Snowflake REST endpoints so the
//! session gateway can run against the real service or an in-memory mock.

mod mock;
mod snowflake;
mod types;

pub use mock::MockWarehouse;
pub use snowflake::SnowflakeRestClient;
pub use types::{
    ColumnInfo, ColumnKind, MaterializeError, NumericPolicy, RawColumn, RawResultSet, Row, Table,
    Value,
};

use crate::config::WarehouseSettings;
use crate::credentials::{ConnectionConfig, SecretString};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// An authenticated warehouse session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseSession {
    /// Session token issued at login.
    pub token: SecretString,

    /// Account endpoint the token is valid for.
    pub base_url: Url,
}

impl WarehouseSession {
    pub fn new(token: impl Into<String>, base_url: Url) -> Self {
        Self {
            token: SecretString::new(token),
            base_url,
        }
    }

    /// Value of the `Authorization` header for requests in this session.
    pub fn authorization_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token.expose())
    }
}

/// Trait defining the interface for warehouse clients.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Authenticates and opens a session.
    async fn login(&self, config: &ConnectionConfig) -> Result<WarehouseSession>;

    /// Executes a SQL statement and returns the unmaterialized result.
    async fn execute(&self, session: &WarehouseSession, sql: &str) -> Result<RawResultSet>;

    /// Closes the session.
    async fn logout(&self, session: &WarehouseSession) -> Result<()>;
}

/// Creates the Snowflake REST warehouse client.
pub fn connect(settings: &WarehouseSettings) -> Result<Arc<dyn Warehouse>> {
    Ok(Arc::new(SnowflakeRestClient::new(settings)?))
}
