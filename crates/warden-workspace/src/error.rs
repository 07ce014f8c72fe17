// error.rs — Error types for path and scope resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving the repository root or scoping a path.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// No ancestor of the hint carries a governance marker.
    #[error("no governed repository found above {hint}")]
    NoGovernedRepoFound { hint: PathBuf },

    /// The path contains a `..` component or an equivalent escape attempt.
    #[error("path traversal rejected: {path}")]
    PathTraversal { path: String },

    /// The normalized path does not live under the workspace root.
    #[error("path resolves outside the governed repository: {path}")]
    PathOutsideRepo { path: String },

    /// The plan file name does not match the allowed grammar.
    #[error("invalid plan file name: {name}")]
    InvalidPlanName { name: String },

    /// Filesystem error while canonicalizing or probing a path.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
