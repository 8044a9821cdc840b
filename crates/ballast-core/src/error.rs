//! Error taxonomy — config, disabled, execution, stop-timeout, lookup.
//!
//! Nothing here is allowed to take down the host process: config errors
//! default, cycle errors are contained in the loop, init errors are
//! contained per service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing configuration. Defaulted and logged wherever a
    /// documented default exists; a hard error only where a service cannot
    /// start at all (e.g. a zero sampling period).
    #[error("config error: {message}")]
    Config { message: String },

    /// A task was submitted to a service that is not enabled. Surfaced
    /// through the failed task handle, never thrown synchronously.
    #[error("service '{service}' is disabled")]
    Disabled { service: String },

    /// A service task failed. The original cause is attached and has
    /// already been logged at error severity.
    #[error("task execution failed in '{service}'")]
    Execution {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    /// The controller worker did not stop within the bounded join window.
    /// Logged as a warning; the worker is left to finish on its own.
    #[error("service '{service}' worker did not stop within {waited_ms}ms")]
    StopTimeout { service: String, waited_ms: u64 },

    /// Typed registry lookup miss.
    #[error("no service registered under '{name}'")]
    ServiceNotFound { name: String },
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
