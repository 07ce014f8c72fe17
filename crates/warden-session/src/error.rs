// error.rs — Error types for session management.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A tool other than begin_session was called before a session existed.
    #[error("no session: call begin_session first")]
    NotInitialized,

    /// begin_session presented a different root than the one already bound.
    #[error("connection already bound to workspace {bound}")]
    AlreadyBound { bound: PathBuf },

    /// The canonical prompt has not been fetched in this session.
    #[error("prompt gate locked: fetch the canonical prompt before acting")]
    PromptGateLocked,

    /// The requested role does not match the process role binding.
    #[error("role '{requested}' does not match process role '{bound}'")]
    RoleMismatch { requested: String, bound: String },
}
