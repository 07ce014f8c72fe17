// entry.rs — Audit entry data model.
//
// One entry per tool dispatch, one JSON line per entry. Entries form a hash
// chain: `hash` is the SHA-256 of the entry's canonical JSON minus the hash
// field itself, and `prev_hash` repeats the predecessor's hash. The first
// entry of a fresh journal links to the sentinel "GENESIS".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical;
use crate::hasher;

/// Sentinel `prev_hash` for the first entry of a fresh journal.
pub const GENESIS_HASH: &str = "GENESIS";

/// Tool name of the terminal entry written by `Journal::seal`.
pub const SEAL_TOOL: &str = "SEAL";

/// Outcome of the dispatched tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryResult {
    /// The tool ran and succeeded.
    Ok,
    /// The tool ran and failed.
    Error,
    /// A governance gate refused the call before it could take effect.
    Blocked,
}

/// A single audit entry — one line in the JSONL journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Monotonic position in the chain, starting at 1.
    pub sequence: u64,

    /// When the entry was appended (UTC, RFC 3339 via serde).
    pub timestamp: DateTime<Utc>,

    /// Session the call belonged to ("-" for pre-session events).
    pub session_id: String,

    /// Role the process was bound to (PLANNER / EXECUTOR / OWNER).
    pub role: String,

    /// Canonical workspace root the call operated on.
    pub workspace_root: String,

    /// Tool name, or one of the lifecycle markers (HALT, SEAL, RECOVERY).
    pub tool: String,

    /// SHA-256 of the canonical JSON of the call's arguments.
    pub args_digest: String,

    /// Plan the call was authorized under, when a binding was presented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    /// Hash of the plan file at the instant of authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,

    /// Outcome of the call.
    pub result: EntryResult,

    /// Stable error code when result is error or blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Free-text context (gate name, check name, reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Hash of the previous entry, or "GENESIS".
    pub prev_hash: String,

    /// SHA-256 of this entry's canonical JSON with `hash` removed.
    pub hash: String,
}

impl AuditEntry {
    /// Recompute this entry's hash from its other fields.
    ///
    /// Serializes the entry, drops the `hash` key, and hashes the canonical
    /// form. Used both when appending and when verifying the chain.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(ref mut map) = value {
            map.remove("hash");
        }
        Ok(hasher::hash_str(&canonical::canonical_json(&value)))
    }

    /// Serialize to the exact line stored in the journal (canonical JSON).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        Ok(canonical::canonical_json(&value))
    }

    /// True for the terminal entry written by `seal()`.
    pub fn is_seal(&self) -> bool {
        self.tool == SEAL_TOOL
    }
}

/// An audit entry before the journal assigns its chain position.
///
/// Callers build drafts; `Journal::append` fills in `sequence`, `prev_hash`,
/// and `hash` under the file lock so the chain stays consistent under
/// concurrent writers.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub role: String,
    pub workspace_root: String,
    pub tool: String,
    pub args_digest: String,
    pub plan_id: Option<String>,
    pub plan_hash: Option<String>,
    pub result: EntryResult,
    pub error_code: Option<String>,
    pub notes: Option<String>,
}

impl EntryDraft {
    /// Create a draft with the current timestamp. Defaults to `Ok`.
    pub fn new(
        session_id: impl Into<String>,
        role: impl Into<String>,
        workspace_root: impl Into<String>,
        tool: impl Into<String>,
        args_digest: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            role: role.into(),
            workspace_root: workspace_root.into(),
            tool: tool.into(),
            args_digest: args_digest.into(),
            plan_id: None,
            plan_hash: None,
            result: EntryResult::Ok,
            error_code: None,
            notes: None,
        }
    }

    /// Record the plan binding this call was authorized under.
    pub fn with_plan(mut self, plan_id: impl Into<String>, plan_hash: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self.plan_hash = Some(plan_hash.into());
        self
    }

    /// Set the outcome.
    pub fn with_result(mut self, result: EntryResult) -> Self {
        self.result = result;
        self
    }

    /// Set the stable error code.
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Attach free-text context.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Materialize the draft at a chain position, computing the hash.
    pub(crate) fn into_entry(
        self,
        sequence: u64,
        prev_hash: String,
    ) -> Result<AuditEntry, serde_json::Error> {
        let mut entry = AuditEntry {
            sequence,
            timestamp: self.timestamp,
            session_id: self.session_id,
            role: self.role,
            workspace_root: self.workspace_root,
            tool: self.tool,
            args_digest: self.args_digest,
            plan_id: self.plan_id,
            plan_hash: self.plan_hash,
            result: self.result,
            error_code: self.error_code,
            notes: self.notes,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EntryDraft {
        EntryDraft::new("sess-1", "EXECUTOR", "/repo", "write_file", "d".repeat(64))
            .with_plan("FOUNDATION-1", "a".repeat(64))
            .with_result(EntryResult::Ok)
    }

    #[test]
    fn hash_excludes_hash_field() {
        let entry = draft().into_entry(1, GENESIS_HASH.to_string()).unwrap();
        // Recomputing with the hash already present must give the same value.
        assert_eq!(entry.hash, entry.compute_hash().unwrap());
    }

    #[test]
    fn hash_covers_every_other_field() {
        let entry = draft().into_entry(1, GENESIS_HASH.to_string()).unwrap();
        let mut tampered = entry.clone();
        tampered.notes = Some("edited".to_string());
        assert_ne!(entry.hash, tampered.compute_hash().unwrap());

        let mut reseq = entry.clone();
        reseq.sequence = 2;
        assert_ne!(entry.hash, reseq.compute_hash().unwrap());
    }

    #[test]
    fn line_round_trip_preserves_fields() {
        let entry = draft().into_entry(3, "f".repeat(64)).unwrap();
        let line = entry.to_line().unwrap();
        let restored: AuditEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(entry, restored);
        assert_eq!(restored.hash, restored.compute_hash().unwrap());
    }

    #[test]
    fn result_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntryResult::Blocked).unwrap(),
            "\"blocked\""
        );
        assert_eq!(serde_json::to_string(&EntryResult::Ok).unwrap(), "\"ok\"");
    }

    #[test]
    fn absent_plan_binding_is_omitted_from_json() {
        let entry = EntryDraft::new("s", "PLANNER", "/r", "list_plans", "x")
            .into_entry(1, GENESIS_HASH.to_string())
            .unwrap();
        let line = entry.to_line().unwrap();
        assert!(!line.contains("plan_id"));
        assert!(!line.contains("error_code"));
    }
}
