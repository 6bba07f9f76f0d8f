//! Logging and runtime configuration for weft.
//!
//! Library crates in the workspace only emit `tracing` events; applications
//! decide where those go. This crate provides:
//!
//! - [`TracingConfig`] - Installs a `tracing-subscriber` subscriber
//! - [`RuntimeConfig`] - Reads `WEFT_NUM_THREADS` and `WEFT_LOG` from the
//!   environment
//!
//! # Example
//!
//! ```
//! use weft_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! TracingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .init();
//! ```

/// Environment-driven runtime configuration.
pub mod config;

/// Tracing subscriber setup.
pub mod tracing_config;

pub use config::{ConfigError, RuntimeConfig};
pub use tracing_config::{TracingConfig, TracingFormat};
