//! Configuration management for cortex-chat.
//!
//! Handles loading application settings from a TOML file. Connection
//! credentials are not stored here; see [`crate::credentials`].

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Analyst API settings.
    #[serde(default)]
    pub analyst: AnalystSettings,

    /// Warehouse connection settings.
    #[serde(default)]
    pub warehouse: WarehouseSettings,

    /// Result summarization settings.
    #[serde(default)]
    pub summary: SummarySettings,

    /// Output settings.
    #[serde(default)]
    pub display: DisplaySettings,
}

/// Analyst API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalystSettings {
    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Semantic model catalog (`<DATABASE>.<SCHEMA>.<STAGE>/<FILE>`).
    pub semantic_models: Vec<String>,

    /// Index of the model selected at startup.
    pub default_model: usize,
}

/// Default analyst request timeout.
pub const DEFAULT_ANALYST_TIMEOUT_SECS: u64 = 50;

/// Semantic models available when the config file does not list any.
pub const DEFAULT_SEMANTIC_MODELS: [&str; 2] = [
    "CORTEX_DEMOS.CONTOSO.ANALYST_STAGE/ContosoDemo.yaml",
    "CORTEX_ANALYST_DEMO.REVENUE_TIMESERIES.RAW_DATA/revenue_timeseries.yaml",
];

impl Default for AnalystSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_ANALYST_TIMEOUT_SECS,
            semantic_models: DEFAULT_SEMANTIC_MODELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_model: 0,
        }
    }
}

impl AnalystSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Overrides `https://<account>.snowflakecomputing.com`.
    pub base_url: Option<String>,

    /// Maximum time to wait for a statement, including polling.
    pub query_timeout_secs: u64,

    /// Maximum number of cached query results per session.
    pub cache_capacity: usize,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            query_timeout_secs: 120,
            cache_capacity: 128,
        }
    }
}

impl WarehouseSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Result summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummarySettings {
    /// Whether small result sets get a generated summary.
    pub enabled: bool,

    /// Model passed to `SNOWFLAKE.CORTEX.COMPLETE`.
    pub model: String,

    /// Only results with at most this many rows are summarized.
    pub max_rows: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "mistral-large2".to_string(),
            max_rows: 20,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySettings {
    /// Maximum rows printed per result table.
    pub max_rows: usize,

    /// Chart width in terminal cells.
    pub chart_width: u16,

    /// Chart height in terminal cells.
    pub chart_height: u16,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_rows: 50,
            chart_width: 72,
            chart_height: 18,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cortex-chat")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ChatError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.analyst.semantic_models.is_empty() {
            return Err(ChatError::config(format!(
                "{}: analyst.semantic_models must not be empty",
                path.display()
            )));
        }
        if self.analyst.default_model >= self.analyst.semantic_models.len() {
            return Err(ChatError::config(format!(
                "{}: analyst.default_model {} is out of range (catalog has {} models)",
                path.display(),
                self.analyst.default_model,
                self.analyst.semantic_models.len()
            )));
        }
        if self.analyst.timeout_secs == 0 {
            return Err(ChatError::config(format!(
                "{}: analyst.timeout_secs must be positive",
                path.display()
            )));
        }
        Ok(())
    }
}
