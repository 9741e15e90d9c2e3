//! Session gateway: warehouse session lifecycle and query execution.

mod cache;

pub use cache::QueryCache;

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::credentials::{ConnectionConfig, SecretString};
use crate::error::{ChatError, Result};
use crate::warehouse::{MaterializeError, NumericPolicy, Table, Warehouse, WarehouseSession};

/// Lifecycle of the warehouse session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Connecting,
    Connected,
    Failed(String),
}

/// Token and endpoint the analyst client authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredential {
    pub base_url: Url,
    pub token: SecretString,
}

impl BearerCredential {
    /// Value of the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token.expose())
    }
}

/// A connected warehouse session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session: WarehouseSession,
    display: String,
}

impl SessionHandle {
    /// Credential for requests made on behalf of this session.
    pub fn bearer(&self) -> BearerCredential {
        BearerCredential {
            base_url: self.session.base_url.clone(),
            token: self.session.token.clone(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.session.token.is_empty()
    }

    /// Display-safe description of the connection (no token).
    pub fn display_string(&self) -> &str {
        &self.display
    }
}

/// Owns the warehouse client, the active session and its result cache.
pub struct SessionGateway {
    warehouse: Arc<dyn Warehouse>,
    state: SessionState,
    handle: Option<SessionHandle>,
    cache: QueryCache,
}

impl SessionGateway {
    pub fn new(warehouse: Arc<dyn Warehouse>, cache_capacity: usize) -> Self {
        Self {
            warehouse,
            state: SessionState::Absent,
            handle: None,
            cache: QueryCache::new(cache_capacity),
        }
    }

    /// Opens a session with the given configuration.
    ///
    /// Missing credentials fail before any network activity. A successful
    /// connect replaces (and logs out) any previous session and clears the
    /// result cache. A failed attempt leaves a previous session in place.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<&SessionHandle> {
        config.require_credentials()?;

        self.state = SessionState::Connecting;
        match self.warehouse.login(config).await {
            Ok(session) => {
                if let Some(old) = self.handle.take() {
                    self.logout_quietly(&old).await;
                }
                self.cache.clear();
                info!(connection = %config.display_string(), "Connected to Snowflake");

                self.state = SessionState::Connected;
                Ok(self.handle.insert(SessionHandle {
                    session,
                    display: config.display_string(),
                }))
            }
            Err(e) => {
                warn!(error = %e, "Snowflake login failed");
                self.state = if self.handle.is_some() {
                    SessionState::Connected
                } else {
                    SessionState::Failed(e.to_string())
                };
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(SessionHandle::is_valid)
    }

    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Executes SQL and returns the materialized table, using the cache.
    ///
    /// Results that contain non-finite numbers are retried with numeric
    /// coercion (NULL and non-finite become zero). Failures are never cached.
    pub async fn run_query(&mut self, sql: &str) -> Result<Arc<Table>> {
        let handle = self.handle.as_ref().ok_or(ChatError::NotConnected)?;

        if let Some(table) = self.cache.get(sql) {
            return Ok(table);
        }

        let started = Instant::now();
        let raw = self.warehouse.execute(&handle.session, sql).await?;

        let table = match Table::materialize(&raw, NumericPolicy::Strict) {
            Ok(table) => table,
            Err(MaterializeError::NonFinite { column }) => {
                warn!(column = %column, "Non-finite values in result, coercing numeric columns");
                Table::materialize(&raw, NumericPolicy::CoerceToZero)
                    .map_err(|e| ChatError::execution(e.to_string()))?
            }
            Err(e) => return Err(ChatError::execution(e.to_string())),
        };

        let table = Arc::new(table.with_execution_time(started.elapsed()));
        self.cache.insert(sql, Arc::clone(&table));
        Ok(table)
    }

    /// Closes the session. No-op when not connected.
    pub async fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.logout_quietly(&handle).await;
            info!("Disconnected from Snowflake");
        }
        self.cache.clear();
        self.state = SessionState::Absent;
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    async fn logout_quietly(&self, handle: &SessionHandle) {
        if let Err(e) = self.warehouse.logout(&handle.session).await {
            warn!(error = %e, "Logout failed");
        }
    }
}
