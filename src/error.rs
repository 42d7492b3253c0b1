//! Error types for the harness
//!
//! Library code returns `crate::error::Result<T>` carrying `HarnessError`;
//! the `ocsctl` binary converts to `anyhow::Error` at its boundary so error
//! chains stay intact while the CLI keeps friendly display.
//!
//! Wait loops built on [`crate::waiter::Waiter`] use `IsTransient` to decide
//! which check failures to swallow until the deadline. Connectivity-shaped
//! errors (`Ssh`, `Http`, `Io`) and failed remote commands are transient:
//! an API server that refuses a connection now may answer on the next
//! attempt. Configuration problems and timeouts are not.
//!
//! `Timeout` is only ever constructed by *callers* of `Waiter`, after the
//! loop, from `expired()`. The waiter itself never raises.

use thiserror::Error;

/// Main error type for ocs-harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command failed on {host} (exit {exit_code}): {command}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("SSH error on {host}: {message}")]
    Ssh {
        host: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Cloud provider error: {provider} - {message}")]
    CloudProvider {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Heketi error: {0}")]
    Heketi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cloud provider {0:?} is not supported")]
    InvalidProvider(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Whether a wait loop may swallow this error and keep polling.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

impl IsTransient for HarnessError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            HarnessError::Ssh { .. }
                | HarnessError::CommandFailed { .. }
                | HarnessError::Http(_)
                | HarnessError::Io(_)
        )
    }
}
