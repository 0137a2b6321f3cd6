//! Shared infrastructure for the pulse gateway client.
//!
//! Contains the pieces every binary needs but the protocol engine does not
//! own: tracing setup and environment-based configuration.

pub mod config;
pub mod telemetry;

pub use config::{ClientConfig, ConfigError};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
