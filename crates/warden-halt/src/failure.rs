// failure.rs — The closed failure taxonomy.
//
// Every failure the system can raise maps to one of these identifiers. The
// table decides, centrally, which failures engage the kill-switch: only
// CRITICAL entries with the trigger bit set. A refused request (bad input,
// locked gate, failed policy) is the system working as intended and stays
// WARN; the switch is for failures that mean the guarantees themselves are
// in doubt.

use serde::{Deserialize, Serialize};

/// Closed set of failure identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FailureId {
    #[serde(rename = "F-AUDIT")]
    Audit,
    #[serde(rename = "F-PLAN")]
    Plan,
    #[serde(rename = "F-POLICY")]
    Policy,
    #[serde(rename = "F-SESSION")]
    Session,
    #[serde(rename = "F-PREFLIGHT")]
    Preflight,
    #[serde(rename = "F-IO")]
    Io,
    #[serde(rename = "F-INTEGRITY")]
    Integrity,
    #[serde(rename = "F-SCOPE")]
    Scope,
    #[serde(rename = "F-KILL")]
    Kill,
    #[serde(rename = "F-BOOTSTRAP")]
    Bootstrap,
    #[serde(rename = "F-RECOVERY")]
    Recovery,
    #[serde(rename = "F-ROLE")]
    Role,
    #[serde(rename = "F-INPUT")]
    Input,
    #[serde(rename = "F-SANDBOX")]
    Sandbox,
}

/// Failure severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warn,
    Critical,
}

/// The taxonomy row for one failure id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureSpec {
    pub id: FailureId,
    pub severity: Severity,
    pub kill_switch_trigger: bool,
    pub retryable: bool,
}

impl FailureId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "F-AUDIT",
            Self::Plan => "F-PLAN",
            Self::Policy => "F-POLICY",
            Self::Session => "F-SESSION",
            Self::Preflight => "F-PREFLIGHT",
            Self::Io => "F-IO",
            Self::Integrity => "F-INTEGRITY",
            Self::Scope => "F-SCOPE",
            Self::Kill => "F-KILL",
            Self::Bootstrap => "F-BOOTSTRAP",
            Self::Recovery => "F-RECOVERY",
            Self::Role => "F-ROLE",
            Self::Input => "F-INPUT",
            Self::Sandbox => "F-SANDBOX",
        }
    }

    /// The taxonomy row for this id.
    pub fn spec(&self) -> FailureSpec {
        let (severity, kill_switch_trigger, retryable) = match self {
            // The chain is the evidence; a broken or unappendable chain
            // means nothing downstream can be trusted.
            Self::Audit => (Severity::Critical, true, false),
            // An escape that got past the scope gate, or a commit observed
            // outside the root.
            Self::Scope => (Severity::Critical, true, false),
            Self::Integrity => (Severity::Critical, true, false),
            Self::Sandbox => (Severity::Critical, true, false),
            // Already halted; refusals under the switch do not re-trigger.
            Self::Kill => (Severity::Critical, false, false),
            Self::Plan => (Severity::Warn, false, true),
            Self::Policy => (Severity::Warn, false, true),
            Self::Session => (Severity::Warn, false, true),
            Self::Preflight => (Severity::Warn, false, true),
            Self::Io => (Severity::Warn, false, true),
            Self::Bootstrap => (Severity::Warn, false, true),
            Self::Recovery => (Severity::Warn, false, true),
            Self::Role => (Severity::Warn, false, true),
            Self::Input => (Severity::Warn, false, true),
        };
        FailureSpec {
            id: *self,
            severity,
            kill_switch_trigger,
            retryable,
        }
    }

    /// True when this failure must engage the kill-switch.
    pub fn engages_kill_switch(&self) -> bool {
        let spec = self.spec();
        spec.severity == Severity::Critical && spec.kill_switch_trigger
    }
}

impl std::fmt::Display for FailureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_triggers_engage() {
        assert!(FailureId::Audit.engages_kill_switch());
        assert!(FailureId::Scope.engages_kill_switch());
        assert!(FailureId::Integrity.engages_kill_switch());
        assert!(FailureId::Sandbox.engages_kill_switch());

        assert!(!FailureId::Kill.engages_kill_switch());
        assert!(!FailureId::Input.engages_kill_switch());
        assert!(!FailureId::Preflight.engages_kill_switch());
        assert!(!FailureId::Policy.engages_kill_switch());
    }

    #[test]
    fn ids_serialize_with_f_prefix() {
        assert_eq!(
            serde_json::to_string(&FailureId::Audit).unwrap(),
            "\"F-AUDIT\""
        );
        let back: FailureId = serde_json::from_str("\"F-SCOPE\"").unwrap();
        assert_eq!(back, FailureId::Scope);
    }

    #[test]
    fn warn_failures_are_retryable() {
        assert!(FailureId::Preflight.spec().retryable);
        assert!(!FailureId::Audit.spec().retryable);
    }
}
