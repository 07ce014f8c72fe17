// error.rs — Error types for the plan registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading plans or resolving a binding.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Filesystem error while scanning or reading plan documents.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Two plan documents declare the same plan_id; the registry refuses to load.
    #[error("duplicate plan_id '{plan_id}' in {first} and {second}")]
    DuplicatePlanId {
        plan_id: String,
        first: String,
        second: String,
    },

    /// The binding is missing one of name / plan_id / plan_hash.
    #[error("plan binding incomplete: missing {missing}")]
    BindingIncomplete { missing: &'static str },

    /// No plan resolves for the presented name or id.
    #[error("no plan resolves for '{reference}'")]
    NotFound { reference: String },

    /// The resolved document declares a different plan_id than presented.
    #[error("plan_id mismatch: document declares '{declared}', caller presented '{presented}'")]
    IdMismatch { declared: String, presented: String },

    /// The document's hash does not equal the caller-supplied plan_hash.
    #[error("plan integrity violation for '{plan_id}': document hash {actual} != presented {presented}")]
    IntegrityViolation {
        plan_id: String,
        actual: String,
        presented: String,
    },

    /// The resolved plan is not in APPROVED status.
    #[error("plan '{plan_id}' is not approved (status: {status})")]
    NotApproved { plan_id: String, status: String },

    /// The resolved document has no parseable header.
    #[error("plan document '{name}' has no parseable header")]
    Unparseable { name: String },
}
