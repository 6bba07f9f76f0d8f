//! Runtime configuration read from the environment.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `WEFT_NUM_THREADS` | Worker count for the [`Threads`] space (positive integer) |
//! | `WEFT_LOG` | `EnvFilter` directives for [`TracingConfig`] |
//!
//! Unset or empty variables keep their defaults.

use thiserror::Error;
use weft_exec::{ExecError, Threads};

use crate::tracing_config::TracingConfig;

/// Variable holding the worker count.
pub const NUM_THREADS_VAR: &str = "WEFT_NUM_THREADS";

/// Variable holding tracing filter directives.
pub const LOG_VAR: &str = "WEFT_LOG";

/// Errors raised while reading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be used.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// The variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The configured thread pool could not be started.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Settings for the default execution space and logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Worker count; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Tracing filter directives.
    pub log_filter: Option<String>,
}

impl RuntimeConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `WEFT_NUM_THREADS` is not a
    /// positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup` instead of the environment.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let threads = read(NUM_THREADS_VAR)
            .map(|value| match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ConfigError::InvalidValue {
                    key: NUM_THREADS_VAR,
                    value,
                }),
            })
            .transpose()?;

        Ok(Self {
            threads,
            log_filter: read(LOG_VAR),
        })
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Sets tracing filter directives.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Starts the thread-backed space this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Exec`] if the pool cannot be started.
    pub fn threads_space(&self) -> Result<Threads, ConfigError> {
        let space = match self.threads {
            Some(n) => Threads::with_threads(n)?,
            None => Threads::new()?,
        };
        Ok(space)
    }

    /// Tracing configuration honoring the filter directives.
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        match &self.log_filter {
            Some(filter) => TracingConfig::new().with_env_filter(filter.clone()),
            None => TracingConfig::new(),
        }
    }
}
