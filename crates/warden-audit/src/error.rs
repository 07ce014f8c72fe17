// error.rs — Error types for the audit subsystem.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Each variant maps to a specific failure mode in the journal pipeline.
// Any of these is treated as F-AUDIT by the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during audit operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Failed to open or create the journal file.
    #[error("failed to open audit journal at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to acquire the advisory lock on the journal file.
    #[error("failed to lock audit journal at {path}: {source}")]
    LockFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an entry to the journal.
    #[error("failed to append audit entry: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to serialize or deserialize an entry (malformed JSON).
    #[error("audit serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The journal has been sealed; no further appends are accepted.
    #[error("audit journal at {path} is sealed")]
    Sealed { path: PathBuf },

    /// A successor journal was requested but the current one is not sealed.
    #[error("audit journal at {path} is not sealed; refusing succession")]
    NotSealed { path: PathBuf },

    /// Failed to rename the sealed journal aside during succession.
    #[error("failed to retire sealed journal at {path}: {source}")]
    RotateFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
