//! Error types for cortex-chat.
//!
//! Defines the main error enum used throughout the application.

use std::time::Duration;
use thiserror::Error;

use crate::credentials::CredentialField;

/// Main error type for cortex-chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A mandatory connection field (token, account, user) is not set.
    #[error("{}", .0.missing_message())]
    MissingCredential(CredentialField),

    /// The warehouse rejected the credentials or the session expired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {} seconds. Please try again.", .0.as_secs())]
    Timeout(Duration),

    /// DNS, connection refused, TLS and other transport failures.
    #[error("Request error: {0}")]
    Transport(String),

    /// The analyst API answered with an HTTP error status.
    #[error(
        "🚨 An Analyst API error has occurred 🚨\n\n\
         * response code: `{status}`\n\
         * request-id: `{request_id}`\n\
         * error code: `{error_code}`\n\n\
         Message:\n```\n{message}\n```"
    )]
    Analyst {
        status: u16,
        request_id: String,
        error_code: String,
        message: String,
    },

    /// The analyst API answered successfully but the payload had no message content.
    #[error("Received an invalid response format from the Analyst API.")]
    MalformedResponse { request_id: String },

    /// SQL execution failed on the warehouse.
    #[error("Error executing query: {0}")]
    Execution(String),

    /// No connected session is available.
    #[error("No active Snowflake session. Please connect to Snowflake first.")]
    NotConnected,

    /// Configuration errors (invalid config file, bad secrets file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Creates an authentication error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps a failed HTTP exchange to `Timeout` or `Transport`.
    ///
    /// The transport detail includes the full source chain, since reqwest's
    /// own message hides causes like "connection refused".
    pub fn from_request_error(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }

        let mut detail = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Transport(detail)
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "Credential Error",
            Self::Auth(_) => "Authentication Error",
            Self::Timeout(_) => "Timeout",
            Self::Transport(_) => "Transport Error",
            Self::Analyst { .. } => "Analyst Error",
            Self::MalformedResponse { .. } => "Malformed Response",
            Self::Execution(_) => "Execution Error",
            Self::NotConnected => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Request id to attach to the analyst error message for this failure.
    pub fn request_id(&self) -> &str {
        match self {
            Self::Analyst { request_id, .. } | Self::MalformedResponse { request_id } => {
                request_id
            }
            Self::Timeout(_) => "timeout",
            _ => "error",
        }
    }
}

/// Result type alias using ChatError.
pub type Result<T> = std::result::Result<T, ChatError>;
