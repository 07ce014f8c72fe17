// error.rs — Gateway errors and their stable wire codes.
//
// Every failure anywhere in the stack funnels into GatewayError before it
// reaches the caller. The mapping is total: each variant has exactly one
// stable code, one failure-taxonomy id, and a blocked-vs-error
// classification for the audit entry. Messages carry bracketed context
// identifying the gate that refused.

use serde_json::{json, Value};
use thiserror::Error;

use warden_audit::AuditError;
use warden_halt::{FailureId, HaltError};
use warden_plan::PlanError;
use warden_policy::PolicyError;
use warden_preflight::PreflightError;
use warden_session::SessionError;
use warden_workspace::ScopeError;

use crate::request::ErrorBody;

/// All failures the gateway can return to a caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Input validation ────────────────────────────────────────
    #[error("[dispatch] {message}")]
    InvalidInputType { message: String },

    #[error("[dispatch] missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("[dispatch] unknown fields: {}", fields.join(", "))]
    UnknownFields { fields: Vec<String> },

    #[error("[dispatch] invalid value for '{field}': {message}")]
    InvalidFieldValue { field: String, message: String },

    // ── Governance gates ────────────────────────────────────────
    #[error("[kill-switch] server is halted; only read and recovery tools are served")]
    KillSwitchEngaged,

    #[error("[audit] chain verification failed at sequence {first_bad_sequence}")]
    AuditTampered { first_bad_sequence: u64 },

    #[error("[enforcement] {message}")]
    EnforcementViolation { message: String },

    #[error("[dispatch] tool '{tool}' is not in the {role} catalog")]
    ToolNotAllowed { tool: String, role: String },

    #[error("[bootstrap] bootstrap is no longer available")]
    BootstrapDisabled,

    #[error("[bootstrap] signature rejected: {message}")]
    BootstrapSignatureInvalid { message: String },

    #[error("[dispatch] client disconnected before completion")]
    ClientDisconnected,

    // ── Component errors ────────────────────────────────────────
    #[error("[session] {0}")]
    Session(#[from] SessionError),

    #[error("[scope] {0}")]
    Scope(#[from] ScopeError),

    #[error("[plan] {0}")]
    Plan(#[from] PlanError),

    #[error("[policy] {0}")]
    Policy(#[from] PolicyError),

    #[error("[preflight] {0}")]
    Preflight(#[from] PreflightError),

    #[error("[audit] {0}")]
    Audit(#[from] AuditError),

    #[error("[halt] {0}")]
    Halt(#[from] HaltError),

    #[error("[internal] {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// The stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInputType { .. } => "INVALID_INPUT_TYPE",
            Self::MissingRequiredField { .. } => "MISSING_REQUIRED_FIELD",
            Self::UnknownFields { .. } => "UNKNOWN_FIELDS",
            Self::InvalidFieldValue { .. } => "INVALID_FIELD_VALUE",
            Self::KillSwitchEngaged => "KILL_SWITCH_ENGAGED",
            Self::AuditTampered { .. } => "AUDIT_TAMPERED",
            Self::EnforcementViolation { .. } => "ENFORCEMENT_VIOLATION",
            Self::ToolNotAllowed { .. } => "ENFORCEMENT_VIOLATION",
            Self::BootstrapDisabled => "BOOTSTRAP_DISABLED",
            Self::BootstrapSignatureInvalid { .. } => "BOOTSTRAP_SIGNATURE_INVALID",
            Self::ClientDisconnected => "CLIENT_DISCONNECTED",

            Self::Session(err) => match err {
                SessionError::NotInitialized => "SESSION_NOT_INITIALIZED",
                SessionError::AlreadyBound { .. } => "SESSION_ALREADY_BOUND",
                SessionError::PromptGateLocked => "PROMPT_GATE_LOCKED",
                SessionError::RoleMismatch { .. } => "ENFORCEMENT_VIOLATION",
            },
            Self::Scope(err) => match err {
                ScopeError::NoGovernedRepoFound { .. } => "NO_GOVERNED_REPO_FOUND",
                ScopeError::PathTraversal { .. } => "PATH_TRAVERSAL",
                ScopeError::PathOutsideRepo { .. } => "PATH_OUTSIDE_REPO",
                ScopeError::InvalidPlanName { .. } => "INVALID_FIELD_VALUE",
                ScopeError::Io { .. } => "INVALID_FIELD_VALUE",
            },
            Self::Plan(err) => match err {
                PlanError::BindingIncomplete { .. } => "PLAN_BINDING_INCOMPLETE",
                PlanError::NotFound { .. } | PlanError::IdMismatch { .. } => "PLAN_ID_MISMATCH",
                PlanError::IntegrityViolation { .. } => "PLAN_INTEGRITY_VIOLATION",
                PlanError::NotApproved { .. } | PlanError::Unparseable { .. } => {
                    "PLAN_NOT_APPROVED"
                }
                PlanError::DuplicatePlanId { .. } => "PLAN_ID_MISMATCH",
                PlanError::Io { .. } => "PLAN_ID_MISMATCH",
            },
            Self::Policy(err) => match err {
                PolicyError::StubDetected { .. } => "POLICY_STUB_DETECTED",
                PolicyError::RegressionDetected { .. } => "POLICY_REGRESSION_DETECTED",
                PolicyError::Unparseable { .. } => "POLICY_UNPARSEABLE",
            },
            Self::Preflight(_) => "PREFLIGHT_FAILED",
            Self::Audit(err) => match err {
                AuditError::Sealed { .. } => "KILL_SWITCH_ENGAGED",
                _ => "AUDIT_APPEND_FAILED",
            },
            Self::Halt(err) => match err {
                HaltError::NotAuthorized { .. } | HaltError::NotEngaged => {
                    "RECOVERY_NOT_AUTHORIZED"
                }
                HaltError::CodeInvalid => "RECOVERY_CODE_INVALID",
                HaltError::CodeExpired => "RECOVERY_CODE_EXPIRED",
                HaltError::Io { .. } | HaltError::Unreadable { .. } | HaltError::Serialization(_) => {
                    "ENFORCEMENT_VIOLATION"
                }
            },
            Self::Internal { .. } => "ENFORCEMENT_VIOLATION",
        }
    }

    /// The failure-taxonomy id, which decides kill-switch engagement.
    pub fn failure_id(&self) -> FailureId {
        match self {
            Self::InvalidInputType { .. }
            | Self::MissingRequiredField { .. }
            | Self::UnknownFields { .. }
            | Self::InvalidFieldValue { .. } => FailureId::Input,
            Self::KillSwitchEngaged => FailureId::Kill,
            Self::AuditTampered { .. } => FailureId::Audit,
            Self::EnforcementViolation { .. } => FailureId::Scope,
            Self::ToolNotAllowed { .. } => FailureId::Role,
            Self::BootstrapDisabled | Self::BootstrapSignatureInvalid { .. } => {
                FailureId::Bootstrap
            }
            Self::ClientDisconnected => FailureId::Session,
            Self::Session(SessionError::RoleMismatch { .. }) => FailureId::Role,
            Self::Session(_) => FailureId::Session,
            Self::Scope(_) => FailureId::Input,
            Self::Plan(_) => FailureId::Plan,
            Self::Policy(_) => FailureId::Policy,
            Self::Preflight(_) => FailureId::Preflight,
            Self::Audit(AuditError::Sealed { .. }) => FailureId::Kill,
            Self::Audit(_) => FailureId::Audit,
            Self::Halt(_) => FailureId::Recovery,
            Self::Internal { .. } => FailureId::Integrity,
        }
    }

    /// True when the audit entry should say `blocked` (a gate refused the
    /// call) rather than `error` (the call was attempted and failed).
    pub fn is_blocked(&self) -> bool {
        !matches!(
            self,
            Self::Internal { .. } | Self::Audit(_) | Self::Halt(HaltError::Io { .. })
        )
    }

    /// Structured details for the wire error body.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::MissingRequiredField { field } => Some(json!({ "field": field })),
            Self::UnknownFields { fields } => Some(json!({ "fields": fields })),
            Self::InvalidFieldValue { field, message } => {
                Some(json!({ "field": field, "reason": message }))
            }
            Self::AuditTampered { first_bad_sequence } => {
                Some(json!({ "first_bad_sequence": first_bad_sequence }))
            }
            Self::Policy(PolicyError::StubDetected { line, reason }) => {
                Some(json!({ "line": line, "reason": reason }))
            }
            Self::Preflight(err) => err
                .check_name()
                .map(|check| json!({ "check": check })),
            _ => None,
        }
    }

    /// Build the wire error body.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(GatewayError::KillSwitchEngaged.code(), "KILL_SWITCH_ENGAGED");
        assert_eq!(
            GatewayError::Session(SessionError::PromptGateLocked).code(),
            "PROMPT_GATE_LOCKED"
        );
        assert_eq!(
            GatewayError::Plan(PlanError::BindingIncomplete { missing: "plan" }).code(),
            "PLAN_BINDING_INCOMPLETE"
        );
        assert_eq!(
            GatewayError::Scope(ScopeError::PathTraversal {
                path: "../x".to_string()
            })
            .code(),
            "PATH_TRAVERSAL"
        );
    }

    #[test]
    fn audit_failures_map_to_the_audit_taxonomy() {
        let err = GatewayError::AuditTampered {
            first_bad_sequence: 2,
        };
        assert_eq!(err.failure_id(), FailureId::Audit);
        assert!(err.failure_id().engages_kill_switch());
    }

    #[test]
    fn refusals_are_blocked_failures_are_errors() {
        assert!(GatewayError::KillSwitchEngaged.is_blocked());
        assert!(GatewayError::Session(SessionError::PromptGateLocked).is_blocked());
        assert!(!GatewayError::Internal {
            message: "x".to_string()
        }
        .is_blocked());
    }

    #[test]
    fn body_carries_code_message_details() {
        let err = GatewayError::MissingRequiredField {
            field: "plan_hash".to_string(),
        };
        let body = err.to_body();
        assert_eq!(body.code, "MISSING_REQUIRED_FIELD");
        assert!(body.message.contains("plan_hash"));
        assert_eq!(body.details.unwrap()["field"], "plan_hash");
    }
}
