//! Core error types for cutter

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Top-level error for a single backup invocation
///
/// Every variant is terminal: nothing in the backup flow retries, and the
/// error is handed back to the caller with enough context to print a
/// diagnosis.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Invalid or missing input (empty jump host, malformed port, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Engine outside the supported set
    #[error("unsupported database type: {0}")]
    UnsupportedEngine(String),

    /// A required external executable is not installed
    #[error("{program} is not installed (not found in PATH)")]
    DependencyMissing {
        /// Name of the missing program
        program: String,
    },

    /// Could not obtain a free loopback port
    #[error("Failed to find available port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// SSH tunnel could not be started or never became ready
    #[error("SSH tunnel failed: {0}")]
    Network(String),

    /// Dump pipeline exited non-zero
    #[error("backup failed: {program} exited with {status}{}", format_diagnostics(.diagnostics))]
    Execution {
        /// Pipeline stage that failed
        program: String,
        /// Exit status of that stage
        status: ExitStatus,
        /// Captured stderr of the pipeline
        diagnostics: String,
    },

    /// Dump did not finish within the configured deadline
    #[error("backup timed out after {0:?}")]
    Timeout(Duration),

    /// Interrupted by the operator
    #[error("backup cancelled")]
    Cancelled,

    /// Filesystem or process I/O failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// Path (or program) involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BackupError {
    /// Build an `Io` error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{}", trimmed)
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
