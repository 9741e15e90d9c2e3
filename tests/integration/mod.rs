//! Integration tests for cortex-chat.

pub mod analyst_http_test;
pub mod orchestrator_test;
pub mod snowflake_rest_test;
pub mod stub;
