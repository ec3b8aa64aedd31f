//! Error types for the Kamina daemon.
//!
//! Startup errors are returned to the CLI layer, which reports them and exits
//! non-zero. Errors after the supervisor reaches `Running` follow the
//! configured crash policy and never crash the supervisor itself.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Kamina library.
#[derive(Debug, Error)]
pub enum KaminaError {
    // Startup errors
    #[error("Binary not found for service '{service}': {program}")]
    BinaryNotFound { service: String, program: String },

    #[error("Service '{service}' did not become ready after {attempts} attempts")]
    ReadinessTimeout { service: String, attempts: u32 },

    #[error("Supervisor already started")]
    AlreadyStarted,

    #[error("Failed to launch service '{service}': {message}")]
    LaunchFailed { service: String, message: String },

    #[error("Startup cancelled by shutdown request")]
    Cancelled,

    // Runtime errors
    #[error("Service '{service}' exited unexpectedly ({status})")]
    ProcessCrashed { service: String, status: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Kamina operations.
pub type Result<T> = std::result::Result<T, KaminaError>;

impl From<std::io::Error> for KaminaError {
    fn from(err: std::io::Error) -> Self {
        KaminaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl KaminaError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        KaminaError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Process exit code for the `kamina daemon` command.
    ///
    /// `0` is reserved for a normal shutdown; every error maps to `1`.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Whether this error aborted startup (as opposed to occurring while the
    /// daemon was already running).
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            KaminaError::BinaryNotFound { .. }
                | KaminaError::ReadinessTimeout { .. }
                | KaminaError::AlreadyStarted
                | KaminaError::LaunchFailed { .. }
                | KaminaError::Cancelled
        )
    }
}
