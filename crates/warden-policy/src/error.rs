// error.rs — Error types for the policy engine.
//
// Each variant corresponds to a stable wire code: POLICY_STUB_DETECTED,
// POLICY_REGRESSION_DETECTED, POLICY_UNPARSEABLE.

use thiserror::Error;

/// Errors raised while checking a proposed write.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The added code contains a stub, placeholder, or forbidden pattern.
    #[error("stub detected at line {line}: {reason}")]
    StubDetected { line: usize, reason: String },

    /// The diff removes a guard call or comments out executing code.
    #[error("regression detected: {reason}")]
    RegressionDetected { reason: String },

    /// The content could not be parsed; the write is rejected, never accepted.
    #[error("content is unparseable: {reason}")]
    Unparseable { reason: String },
}
