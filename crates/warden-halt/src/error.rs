// error.rs — Error types for the kill-switch and recovery gate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by halt persistence and the recovery protocol.
#[derive(Debug, Error)]
pub enum HaltError {
    /// Filesystem error while reading or writing halt state.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The halt file exists but cannot be parsed. Startup must refuse to
    /// serve (exit code 30) rather than guess.
    #[error("halt file at {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// A recovery operation was attempted while no halt is engaged.
    #[error("kill-switch is not engaged")]
    NotEngaged,

    /// The owner acknowledgements or reason were incomplete.
    #[error("recovery not authorized: {reason}")]
    NotAuthorized { reason: String },

    /// The presented confirmation code did not match, or no challenge is
    /// pending. The attempt is invalidated either way.
    #[error("recovery code invalid")]
    CodeInvalid,

    /// The pending confirmation code passed its TTL before confirm.
    #[error("recovery code expired")]
    CodeExpired,

    /// Serialization of halt state failed.
    #[error("halt state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
