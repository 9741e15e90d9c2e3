//! Command-line argument parsing for cortex-chat.

use clap::Parser;
use cortex_chat::config::Config;
use cortex_chat::credentials::{default_secrets_path, CredentialField, CredentialLayer};
use std::path::PathBuf;

/// Ask questions about your Snowflake data in plain English, answered by Cortex Analyst.
#[derive(Parser, Debug)]
#[command(name = "cortex-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Snowflake account identifier (e.g., xy12345.us-east-1 or myorg-myaccount)
    #[arg(short = 'a', long, value_name = "ACCOUNT")]
    pub account: Option<String>,

    /// Snowflake user
    #[arg(short = 'u', long, value_name = "USER")]
    pub user: Option<String>,

    /// Warehouse used for generated SQL
    #[arg(short = 'w', long, value_name = "WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Default database
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Default schema
    #[arg(short = 's', long, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// Authenticator (default: snowflake)
    #[arg(long, value_name = "AUTHENTICATOR")]
    pub authenticator: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Secrets file path (only read in debug mode)
    #[arg(long, value_name = "PATH")]
    pub secrets: Option<PathBuf>,

    /// Debug mode: also read credentials from the secrets file
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Semantic model to start with (number or file name)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Connect to Snowflake at startup
    #[arg(long)]
    pub connect: bool,

    /// Ask a single question, print the answer and exit
    #[arg(long, value_name = "QUESTION")]
    pub ask: Option<String>,

    /// Use the scripted analyst and warehouse (no network)
    #[arg(long)]
    pub mock: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path (from CLI or default).
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the secrets file path (from CLI or default).
    pub fn secrets_path(&self) -> PathBuf {
        self.secrets.clone().unwrap_or_else(default_secrets_path)
    }

    /// Whether logs go to stderr.
    pub fn logs_to_stderr(&self) -> bool {
        self.log_stderr || self.ask.is_some()
    }

    /// Connection values given on the command line, as the interactive layer.
    pub fn interactive_layer(&self) -> CredentialLayer {
        let values = [
            (CredentialField::Account, &self.account),
            (CredentialField::User, &self.user),
            (CredentialField::Warehouse, &self.warehouse),
            (CredentialField::Database, &self.database),
            (CredentialField::Schema, &self.schema),
            (CredentialField::Authenticator, &self.authenticator),
        ];

        let mut layer = CredentialLayer::interactive();
        for (field, value) in values {
            if let Some(value) = value {
                layer.set(field, value.clone());
            }
        }
        layer
    }
}
