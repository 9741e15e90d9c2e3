//! Mock warehouse for testing and offline demos.
//!
//! Results are scripted by SQL fragment; every executed statement is recorded.

use super::{RawColumn, RawResultSet, Warehouse, WarehouseSession};
use crate::credentials::ConnectionConfig;
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Rows(RawResultSet),
    Failure(String),
}

/// A mock warehouse that returns predefined results.
#[derive(Debug, Default)]
pub struct MockWarehouse {
    scripts: Vec<(String, Scripted)>,
    executed: Mutex<Vec<String>>,
    reject_logins: bool,
    logins: AtomicUsize,
    logged_out: AtomicBool,
}

impl MockWarehouse {
    /// Creates a mock with no scripted results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `result` for statements containing `fragment` (case-insensitive).
    ///
    /// Scripts are matched in registration order.
    pub fn with_result(mut self, fragment: &str, result: RawResultSet) -> Self {
        self.scripts
            .push((fragment.to_uppercase(), Scripted::Rows(result)));
        self
    }

    /// Fails statements containing `fragment` with an execution error.
    pub fn with_failure(mut self, fragment: &str, message: &str) -> Self {
        self.scripts.push((
            fragment.to_uppercase(),
            Scripted::Failure(message.to_string()),
        ));
        self
    }

    /// Rejects every login with an authentication error.
    pub fn rejecting_logins(mut self) -> Self {
        self.reject_logins = true;
        self
    }

    /// A mock preloaded with the revenue demo data used by `--mock`.
    pub fn demo() -> Self {
        let revenue = RawResultSet::new(
            vec![
                RawColumn::new("MONTH", "text"),
                RawColumn::new("REVENUE", "fixed").with_scale(2),
            ],
            [
                ("2024-01", "182340.50"),
                ("2024-02", "175902.10"),
                ("2024-03", "201455.75"),
                ("2024-04", "215030.00"),
                ("2024-05", "228761.40"),
                ("2024-06", "219884.95"),
            ]
            .iter()
            .map(|(m, r)| vec![Some(m.to_string()), Some(r.to_string())])
            .collect(),
        );

        let insights = RawResultSet::new(
            vec![RawColumn::new("INSIGHTS", "text")],
            vec![vec![Some(
                "Revenue grew from about 182K in January to a peak of 229K in May, \
                 a 25% increase, with a brief dip in February and a slight decline in June."
                    .to_string(),
            )]],
        );

        // The summary statement embeds the original query, so it is matched first.
        Self::new()
            .with_result("SNOWFLAKE.CORTEX.COMPLETE", insights)
            .with_result("REVENUE", revenue)
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Number of successful logins.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Whether logout has been called at least once.
    pub fn was_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str) {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn login(&self, config: &ConnectionConfig) -> Result<WarehouseSession> {
        config.require_credentials()?;
        if self.reject_logins {
            return Err(ChatError::auth(
                "Incorrect username or password was specified.",
            ));
        }

        self.logins.fetch_add(1, Ordering::SeqCst);
        let base_url = Url::parse("http://mock.invalid/")
            .map_err(|e| ChatError::internal(e.to_string()))?;
        Ok(WarehouseSession::new("mock-session-token", base_url))
    }

    async fn execute(&self, _session: &WarehouseSession, sql: &str) -> Result<RawResultSet> {
        self.record(sql);
        let sql_upper = sql.to_uppercase();

        if let Some((_, scripted)) = self
            .scripts
            .iter()
            .find(|(fragment, _)| sql_upper.contains(fragment.as_str()))
        {
            return match scripted {
                Scripted::Rows(result) => Ok(result.clone()),
                Scripted::Failure(message) => Err(ChatError::execution(message.clone())),
            };
        }

        if sql_upper.trim_start().starts_with("SELECT") {
            Ok(RawResultSet::new(
                vec![RawColumn::new("result", "text")],
                vec![vec![Some(format!("Mock result for: {sql}"))]],
            ))
        } else {
            Ok(RawResultSet::default())
        }
    }

    async fn logout(&self, _session: &WarehouseSession) -> Result<()> {
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }
}
