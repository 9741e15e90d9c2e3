//! cortex-chat - Ask questions about Snowflake data through Cortex Analyst.
//!
//! This library exposes the core modules for use by the binary and integration tests.

pub mod analyst;
pub mod app;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod render;
pub mod session;
pub mod warehouse;
