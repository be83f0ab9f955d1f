//! Builders
//!
//! Fluent builders for client configuration.

pub mod config;

pub use config::{auth_client_config, AuthClientConfigBuilder};
