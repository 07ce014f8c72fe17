// maturity.rs — Evidence-based maturity scorecard.
//
// Six dimensions, each scored 1-5 from observable artifacts only: the audit
// journal, the plan registry, and the declared preflight checks. No
// self-reporting. A dimension with no evidence at all is capped at 2, and
// the overall score is the minimum — a system is only as mature as its
// weakest guarantee. Given the same inputs the scorecard is identical.

use serde::{Deserialize, Serialize};

use warden_audit::{AuditEntry, EntryResult};
use warden_plan::{PlanRecord, PlanStatus};

/// The scored dimensions plus the overall minimum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scorecard {
    pub reliability: u8,
    pub security: u8,
    pub documentation: u8,
    pub governance: u8,
    pub integration: u8,
    pub performance: u8,
    pub overall: u8,
}

/// Score maximum when a dimension has no supporting evidence.
const NO_EVIDENCE_CAP: u8 = 2;

/// Compute the scorecard from observable evidence.
pub fn score(entries: &[AuditEntry], plans: &[PlanRecord], declared_checks: usize) -> Scorecard {
    let reliability = score_reliability(entries);
    let security = score_security(entries);
    let documentation = score_documentation(plans);
    let governance = score_governance(entries);
    let integration = score_integration(declared_checks);
    // No latency samples are collected in this deployment, so performance
    // evidence is always missing.
    let performance = NO_EVIDENCE_CAP;

    let overall = [
        reliability,
        security,
        documentation,
        governance,
        integration,
        performance,
    ]
    .into_iter()
    .min()
    .unwrap_or(1);

    Scorecard {
        reliability,
        security,
        documentation,
        governance,
        integration,
        performance,
        overall,
    }
}

/// Reliability: share of dispatches that completed ok.
fn score_reliability(entries: &[AuditEntry]) -> u8 {
    if entries.is_empty() {
        return NO_EVIDENCE_CAP;
    }
    let ok = entries
        .iter()
        .filter(|e| e.result == EntryResult::Ok)
        .count();
    match ok * 100 / entries.len() {
        90..=100 => 5,
        75..=89 => 4,
        50..=74 => 3,
        25..=49 => 2,
        _ => 1,
    }
}

/// Security: enforcement escapes are disqualifying; gates demonstrably
/// firing (blocked entries) is the strongest positive evidence.
fn score_security(entries: &[AuditEntry]) -> u8 {
    if entries.is_empty() {
        return NO_EVIDENCE_CAP;
    }
    let escapes = entries
        .iter()
        .filter(|e| {
            matches!(
                e.error_code.as_deref(),
                Some("ENFORCEMENT_VIOLATION") | Some("AUDIT_TAMPERED")
            )
        })
        .count();
    if escapes > 0 {
        return 1;
    }
    let blocked = entries
        .iter()
        .filter(|e| e.result == EntryResult::Blocked)
        .count();
    if blocked > 0 {
        5
    } else {
        4
    }
}

/// Documentation: plan documents that parse, with at least one approved.
fn score_documentation(plans: &[PlanRecord]) -> u8 {
    if plans.is_empty() {
        return NO_EVIDENCE_CAP;
    }
    let parseable = plans
        .iter()
        .filter(|p| p.status != PlanStatus::Unparseable)
        .count();
    let approved = plans
        .iter()
        .any(|p| p.status == PlanStatus::Approved);
    match (parseable == plans.len(), approved) {
        (true, true) => 5,
        (true, false) => 4,
        (false, _) if parseable * 2 >= plans.len() => 3,
        _ => 1,
    }
}

/// Governance: share of successful writes that carried a plan binding.
fn score_governance(entries: &[AuditEntry]) -> u8 {
    let writes: Vec<&AuditEntry> = entries
        .iter()
        .filter(|e| e.tool == "write_file" && e.result == EntryResult::Ok)
        .collect();
    if writes.is_empty() {
        return NO_EVIDENCE_CAP;
    }
    let bound = writes.iter().filter(|e| e.plan_id.is_some()).count();
    match bound * 100 / writes.len() {
        100 => 5,
        80..=99 => 4,
        50..=79 => 3,
        _ => 1,
    }
}

/// Integration: declared external checks.
fn score_integration(declared_checks: usize) -> u8 {
    match declared_checks {
        0 => NO_EVIDENCE_CAP,
        1 => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::EntryDraft;

    fn entry(tool: &str, result: EntryResult, error_code: Option<&str>, plan: bool) -> AuditEntry {
        let mut draft = EntryDraft::new("s", "EXECUTOR", "/r", tool, "digest").with_result(result);
        if let Some(code) = error_code {
            draft = draft.with_error_code(code);
        }
        if plan {
            draft = draft.with_plan("P-1", "a".repeat(64));
        }
        materialize(draft)
    }

    // Scoring only reads plain fields; chain position is irrelevant here.
    fn materialize(draft: EntryDraft) -> AuditEntry {
        AuditEntry {
            sequence: 1,
            timestamp: draft.timestamp,
            session_id: draft.session_id,
            role: draft.role,
            workspace_root: draft.workspace_root,
            tool: draft.tool,
            args_digest: draft.args_digest,
            plan_id: draft.plan_id,
            plan_hash: draft.plan_hash,
            result: draft.result,
            error_code: draft.error_code,
            notes: draft.notes,
            prev_hash: "GENESIS".to_string(),
            hash: String::new(),
        }
    }

    fn plan(name: &str, status: PlanStatus) -> PlanRecord {
        PlanRecord {
            name: name.to_string(),
            plan_id: (status != PlanStatus::Unparseable).then(|| name.trim_end_matches(".md").to_string()),
            status,
            hash: "b".repeat(64),
            path: std::path::PathBuf::from(name),
        }
    }

    #[test]
    fn empty_evidence_caps_everything_at_two() {
        let card = score(&[], &[], 0);
        assert_eq!(card.reliability, 2);
        assert_eq!(card.security, 2);
        assert_eq!(card.documentation, 2);
        assert_eq!(card.governance, 2);
        assert_eq!(card.integration, 2);
        assert_eq!(card.performance, 2);
        assert_eq!(card.overall, 2);
    }

    #[test]
    fn overall_is_the_minimum() {
        let entries = vec![
            entry("write_file", EntryResult::Ok, None, true),
            entry("read_file", EntryResult::Ok, None, false),
            entry("write_file", EntryResult::Blocked, Some("PROMPT_GATE_LOCKED"), false),
        ];
        let plans = vec![plan("a.md", PlanStatus::Approved)];
        let card = score(&entries, &plans, 2);
        // performance is pinned at 2, so overall is 2 regardless of the rest.
        assert_eq!(card.performance, 2);
        assert_eq!(card.overall, 2);
        assert!(card.security >= 4);
        assert_eq!(card.governance, 5);
    }

    #[test]
    fn enforcement_escape_floors_security() {
        let entries = vec![entry(
            "write_file",
            EntryResult::Error,
            Some("ENFORCEMENT_VIOLATION"),
            false,
        )];
        let card = score(&entries, &[], 0);
        assert_eq!(card.security, 1);
        assert_eq!(card.overall, 1);
    }

    #[test]
    fn unbound_writes_hurt_governance() {
        let entries = vec![
            entry("write_file", EntryResult::Ok, None, true),
            entry("write_file", EntryResult::Ok, None, false),
        ];
        let card = score(&entries, &[], 0);
        assert_eq!(card.governance, 3);
    }

    #[test]
    fn deterministic_given_same_input() {
        let entries = vec![entry("read_file", EntryResult::Ok, None, false)];
        let plans = vec![plan("a.md", PlanStatus::Draft)];
        assert_eq!(score(&entries, &plans, 1), score(&entries, &plans, 1));
    }
}
