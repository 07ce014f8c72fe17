// error.rs — Error types for the preflight runner.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running preflight checks.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// Filesystem error while staging or reading the manifest.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The check manifest exists but is malformed.
    #[error("invalid preflight manifest: {reason}")]
    ManifestInvalid { reason: String },

    /// A declared check exited non-zero.
    #[error("preflight check '{check}' failed with exit code {exit_code:?}")]
    CheckFailed {
        check: String,
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    /// A declared check exceeded its wall-clock deadline and was killed.
    #[error("preflight check '{check}' timed out after {timeout_secs}s")]
    CheckTimedOut { check: String, timeout_secs: u64 },

    /// A declared check's binary could not be started.
    #[error("preflight check '{check}' could not start: {source}")]
    SpawnFailed {
        check: String,
        source: std::io::Error,
    },
}

impl PreflightError {
    /// The check name for failure reporting, when one applies.
    pub fn check_name(&self) -> Option<&str> {
        match self {
            Self::CheckFailed { check, .. }
            | Self::CheckTimedOut { check, .. }
            | Self::SpawnFailed { check, .. } => Some(check),
            _ => None,
        }
    }
}
