//! Credential resolution for warehouse connections.
//!
//! Connection fields come from an ordered list of layers: interactive input
//! (CLI flags and `/set`), process environment, and a local secrets file that
//! is only consulted in debug mode. Higher layers win, but only with values
//! that are non-empty and not template placeholders.

use crate::error::{ChatError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Default authenticator passed to the login endpoint.
pub const DEFAULT_AUTHENTICATOR: &str = "snowflake";

/// A single connection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CredentialField {
    Account,
    User,
    Token,
    Warehouse,
    Database,
    Schema,
    Authenticator,
}

impl CredentialField {
    /// All fields, in display order.
    pub const ALL: [CredentialField; 7] = [
        Self::Account,
        Self::User,
        Self::Token,
        Self::Warehouse,
        Self::Database,
        Self::Schema,
        Self::Authenticator,
    ];

    /// Short lowercase key used in commands and placeholders.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::User => "user",
            Self::Token => "token",
            Self::Warehouse => "warehouse",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Authenticator => "authenticator",
        }
    }

    /// Environment variable holding this field.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Account => "SNOWFLAKE_ACCOUNT",
            Self::User => "SNOWFLAKE_USER",
            Self::Token => "SNOWFLAKE_PAT",
            Self::Warehouse => "SNOWFLAKE_WAREHOUSE",
            Self::Database => "SNOWFLAKE_DATABASE",
            Self::Schema => "SNOWFLAKE_SCHEMA",
            Self::Authenticator => "SNOWFLAKE_AUTHENTICATOR",
        }
    }

    /// Key inside the `[connections.snowflake]` table of the secrets file.
    pub fn secrets_key(&self) -> &'static str {
        match self {
            Self::Account => "ACCOUNT",
            Self::User => "USER",
            Self::Token => "PAT",
            Self::Warehouse => "WAREHOUSE",
            Self::Database => "DATABASE",
            Self::Schema => "SCHEMA",
            Self::Authenticator => "AUTHENTICATOR",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::User => "User",
            Self::Token => "Personal Access Token",
            Self::Warehouse => "Warehouse",
            Self::Database => "Database",
            Self::Schema => "Schema",
            Self::Authenticator => "Authenticator",
        }
    }

    /// Message shown when a mandatory field is missing at connect time.
    pub fn missing_message(&self) -> String {
        format!("Please provide a valid {}.", self.label())
    }

    /// Returns true for fields whose value must never be displayed.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Token)
    }

    /// Returns true if `value` is the template placeholder for this field
    /// (e.g. `your-account`).
    pub fn is_placeholder(&self, value: &str) -> bool {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        normalized == format!("your-{}", self.key())
    }
}

impl FromStr for CredentialField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "account" => Ok(Self::Account),
            "user" => Ok(Self::User),
            "token" | "pat" | "password" => Ok(Self::Token),
            "warehouse" => Ok(Self::Warehouse),
            "database" => Ok(Self::Database),
            "schema" => Ok(Self::Schema),
            "authenticator" => Ok(Self::Authenticator),
            _ => Err(format!(
                "Unknown field: {s}. Expected one of: account, user, token, warehouse, database, schema, authenticator"
            )),
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A string that is masked whenever it is formatted.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret. Only call this at the point of use.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", mask_secret(&self.0))
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask_secret(&self.0))
    }
}

/// Masks a secret for display, showing only the last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        "*".repeat(chars.len())
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", "*".repeat(4), tail)
    }
}

fn account_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("account pattern is valid")
    })
}

/// Effective warehouse connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub account: Option<String>,
    pub user: Option<String>,
    pub token: Option<SecretString>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub authenticator: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            account: None,
            user: None,
            token: None,
            warehouse: None,
            database: None,
            schema: None,
            authenticator: DEFAULT_AUTHENTICATOR.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Returns the value of a field, if set.
    pub fn get(&self, field: CredentialField) -> Option<&str> {
        match field {
            CredentialField::Account => self.account.as_deref(),
            CredentialField::User => self.user.as_deref(),
            CredentialField::Token => self.token.as_ref().map(SecretString::expose),
            CredentialField::Warehouse => self.warehouse.as_deref(),
            CredentialField::Database => self.database.as_deref(),
            CredentialField::Schema => self.schema.as_deref(),
            CredentialField::Authenticator => Some(self.authenticator.as_str()),
        }
    }

    /// Sets a field.
    pub fn set(&mut self, field: CredentialField, value: impl Into<String>) {
        let value = value.into();
        match field {
            CredentialField::Account => self.account = Some(value),
            CredentialField::User => self.user = Some(value),
            CredentialField::Token => self.token = Some(SecretString::new(value)),
            CredentialField::Warehouse => self.warehouse = Some(value),
            CredentialField::Database => self.database = Some(value),
            CredentialField::Schema => self.schema = Some(value),
            CredentialField::Authenticator => self.authenticator = value,
        }
    }

    /// Checks the mandatory fields in the order token, account, user.
    ///
    /// Returns `(account, user, token)` when all are present and non-empty.
    pub fn require_credentials(&self) -> Result<(&str, &str, &SecretString)> {
        let token = self
            .token
            .as_ref()
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::MissingCredential(CredentialField::Token))?;
        let account = self
            .account
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(ChatError::MissingCredential(CredentialField::Account))?;
        let user = self
            .user
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ChatError::MissingCredential(CredentialField::User))?;

        if !account_pattern().is_match(account) {
            return Err(ChatError::config(format!(
                "Invalid account identifier '{account}'"
            )));
        }

        Ok((account, user, token))
    }

    /// Returns a display-safe string (no token) for UI purposes.
    pub fn display_string(&self) -> String {
        let user = self.user.as_deref().unwrap_or("?");
        let account = self.account.as_deref().unwrap_or("?");
        let mut out = format!("{user} @ {account}");
        let scope: Vec<&str> = [&self.warehouse, &self.database, &self.schema]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        if !scope.is_empty() {
            out.push_str(&format!(" ({})", scope.join("/")));
        }
        out
    }
}

/// Where a layer's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Interactive,
    Environment,
    Secrets,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "input",
            Self::Environment => "environment",
            Self::Secrets => "secrets",
        }
    }
}

/// One source of connection field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialLayer {
    kind: LayerKind,
    values: BTreeMap<CredentialField, String>,
}

impl CredentialLayer {
    /// Creates an empty layer of the given kind.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    /// Creates an empty interactive layer.
    pub fn interactive() -> Self {
        Self::new(LayerKind::Interactive)
    }

    /// Builder-style setter.
    pub fn with(mut self, field: CredentialField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: CredentialField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn unset(&mut self, field: CredentialField) {
        self.values.remove(&field);
    }

    pub fn get(&self, field: CredentialField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Reads the `SNOWFLAKE_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds an environment layer from an explicit variable list.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::new(LayerKind::Environment);
        for (name, value) in vars {
            if let Some(field) = CredentialField::ALL
                .iter()
                .find(|f| f.env_var() == name.as_ref())
            {
                layer.set(*field, value);
            }
        }
        layer
    }

    /// Loads the secrets layer from a TOML file. A missing file is an empty layer.
    pub fn from_secrets_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(LayerKind::Secrets));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatError::config(format!("Failed to read secrets file: {e}")))?;

        Self::parse_secrets(&content, path)
    }

    /// Parses the `[connections.snowflake]` table of a secrets file.
    fn parse_secrets(content: &str, path: &Path) -> Result<Self> {
        let file: SecretsFile = toml::from_str(content).map_err(|e| {
            ChatError::config(format!(
                "Secrets error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;

        let mut layer = Self::new(LayerKind::Secrets);
        if let Some(table) = file.connections.get("snowflake") {
            for field in CredentialField::ALL {
                // Non-string entries (ports, flags) belong to other tools.
                let value = table.get(field.secrets_key()).and_then(toml::Value::as_str);
                if let Some(value) = value {
                    layer.set(field, value);
                }
            }
        }
        Ok(layer)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    connections: HashMap<String, toml::Table>,
}

/// Returns the default secrets file path for the current platform.
pub fn default_secrets_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cortex-chat")
        .join("secrets.toml")
}

/// The effective configuration plus the layer each field came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub config: ConnectionConfig,
    pub sources: BTreeMap<CredentialField, LayerKind>,
}

impl ResolvedConnection {
    /// Lines describing each field and its source, with the token masked.
    pub fn describe(&self) -> Vec<String> {
        CredentialField::ALL
            .iter()
            .map(|field| {
                let value = match self.config.get(*field) {
                    Some(v) if field.is_secret() => mask_secret(v),
                    Some(v) => v.to_string(),
                    None => "(not set)".to_string(),
                };
                let source = self
                    .sources
                    .get(field)
                    .map(|k| k.as_str())
                    .unwrap_or("default");
                format!("{:<14} {} [{}]", field.label(), value, source)
            })
            .collect()
    }
}

/// Merges credential layers into a single [`ConnectionConfig`].
///
/// Layers are stored highest precedence first.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    layers: Vec<CredentialLayer>,
}

impl CredentialResolver {
    /// Creates a resolver from layers ordered highest precedence first.
    pub fn new(layers: Vec<CredentialLayer>) -> Self {
        Self { layers }
    }

    /// Builds the standard stack: interactive, environment, and secrets when
    /// `debug` is set.
    pub fn standard(
        interactive: CredentialLayer,
        environment: CredentialLayer,
        secrets: Option<CredentialLayer>,
        debug: bool,
    ) -> Self {
        let mut layers = vec![interactive, environment];
        if debug {
            layers.extend(secrets);
        }
        Self::new(layers)
    }

    /// Returns the interactive layer for `/set` and `/unset`.
    pub fn interactive_mut(&mut self) -> &mut CredentialLayer {
        if let Some(pos) = self
            .layers
            .iter()
            .position(|l| l.kind() == LayerKind::Interactive)
        {
            return &mut self.layers[pos];
        }
        self.layers.insert(0, CredentialLayer::interactive());
        &mut self.layers[0]
    }

    /// Resolves the effective configuration.
    pub fn resolve(&self) -> ResolvedConnection {
        let mut config = ConnectionConfig::default();
        let mut sources = BTreeMap::new();

        // Lowest precedence first, so later layers override.
        for layer in self.layers.iter().rev() {
            for (field, value) in &layer.values {
                let value = value.trim();
                if value.is_empty() || field.is_placeholder(value) {
                    continue;
                }
                config.set(*field, value);
                sources.insert(*field, layer.kind());
            }
        }

        ResolvedConnection { config, sources }
    }
}
