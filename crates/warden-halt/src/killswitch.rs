// killswitch.rs — Persistent halt state.
//
// Engagement writes two things under `.governance/halt/`: a halt report
// (`<halt_id>.json`) and a pointer file (`current`) naming the active halt.
// Absence of the pointer IS the not-halted state; startup reads it before
// accepting any request, so the restriction survives restarts. Reports are
// written atomically (temp + fsync + rename) and are never deleted — a
// cleared halt keeps its report for the record, only the pointer goes away.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HaltError;
use crate::failure::FailureId;
use crate::recovery::RecoveryChallenge;

/// Where a halt stands in the recovery protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecoveryState {
    /// Halted; no recovery attempt pending.
    Locked,
    /// An initiate succeeded; a confirmation code is outstanding.
    Pending,
    /// Recovery confirmed; the switch has been released.
    Cleared,
}

/// What tripped the switch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HaltTrigger {
    pub failure_ids: Vec<FailureId>,
    pub reason: String,
}

/// One recovery event (initiate or confirm), success or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationRecord {
    pub at: DateTime<Utc>,
    /// "initiate" or "confirm".
    pub event: String,
    /// "issued", "cleared", "rejected: <why>".
    pub outcome: String,
    pub session_id: String,
}

/// The persisted halt report: human-readable summary plus machine fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltReport {
    pub id: String,
    pub engaged_at: DateTime<Utc>,
    pub trigger: HaltTrigger,
    /// Hash of the last audit entry at engagement (the SEAL entry).
    pub sealing_hash: String,
    pub recovery_state: RecoveryState,
    /// Every recovery attempt against this halt, in order.
    #[serde(default)]
    pub confirmations: Vec<ConfirmationRecord>,
    /// Outstanding confirmation challenge, while state is Pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<RecoveryChallenge>,
    /// Checks a human should run before clearing the halt.
    pub recommended_checks: Vec<String>,
    pub summary: String,
}

impl HaltReport {
    fn new(trigger: HaltTrigger, sealing_hash: String) -> Self {
        let id = format!("halt-{}", Uuid::new_v4().simple());
        let failures: Vec<&str> = trigger.failure_ids.iter().map(|f| f.as_str()).collect();
        let summary = format!(
            "Server halted on {} ({}). The audit journal is sealed at {}. \
             All mutating tools are refused until an Owner completes the \
             two-step recovery protocol.",
            failures.join(", "),
            trigger.reason,
            sealing_hash
        );
        Self {
            id,
            engaged_at: Utc::now(),
            trigger,
            sealing_hash,
            recovery_state: RecoveryState::Locked,
            confirmations: Vec::new(),
            challenge: None,
            recommended_checks: vec![
                "verify the audit chain of the sealed journal".to_string(),
                "review the tail of the sealed journal for the triggering calls".to_string(),
                "diff the working tree against the last known-good state".to_string(),
            ],
            summary,
        }
    }
}

/// Owner of the halt directory. Only this type writes halt files; only the
/// recovery gate mutates `recovery_state` (through `save_report`).
pub struct KillSwitch {
    halt_dir: PathBuf,
}

impl KillSwitch {
    /// `halt_dir` is `.governance/halt/` under the workspace root.
    pub fn new(halt_dir: impl Into<PathBuf>) -> Self {
        Self {
            halt_dir: halt_dir.into(),
        }
    }

    pub fn halt_dir(&self) -> &Path {
        &self.halt_dir
    }

    fn pointer_path(&self) -> PathBuf {
        self.halt_dir.join("current")
    }

    fn report_path(&self, halt_id: &str) -> PathBuf {
        self.halt_dir.join(format!("{}.json", halt_id))
    }

    /// True when a halt pointer exists. Cheap enough to check per request.
    pub fn is_engaged(&self) -> bool {
        self.pointer_path().exists()
    }

    /// Engage the switch: write the report, then the pointer.
    ///
    /// The caller seals the audit journal first and passes the sealing
    /// hash; engagement is idempotent in effect — if a halt is already
    /// current, the existing report is returned untouched.
    pub fn engage(
        &self,
        failure_ids: Vec<FailureId>,
        reason: impl Into<String>,
        sealing_hash: impl Into<String>,
    ) -> Result<HaltReport, HaltError> {
        if let Some(existing) = self.current_report()? {
            return Ok(existing);
        }

        let report = HaltReport::new(
            HaltTrigger {
                failure_ids,
                reason: reason.into(),
            },
            sealing_hash.into(),
        );
        self.save_report(&report)?;
        self.write_atomic(&self.pointer_path(), report.id.as_bytes())?;
        tracing::error!(halt_id = %report.id, reason = %report.trigger.reason, "kill-switch engaged");
        Ok(report)
    }

    /// The report named by the pointer, if a halt is current.
    ///
    /// An unreadable pointer or report is `HaltError::Unreadable`; callers
    /// at startup map that to exit code 30.
    pub fn current_report(&self) -> Result<Option<HaltReport>, HaltError> {
        let pointer = self.pointer_path();
        let halt_id = match std::fs::read_to_string(&pointer) {
            Ok(id) => id.trim().to_string(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(HaltError::Unreadable {
                    path: pointer,
                    reason: err.to_string(),
                })
            }
        };

        let path = self.report_path(&halt_id);
        let raw = std::fs::read_to_string(&path).map_err(|err| HaltError::Unreadable {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let report = serde_json::from_str(&raw).map_err(|err| HaltError::Unreadable {
            path,
            reason: err.to_string(),
        })?;
        Ok(Some(report))
    }

    /// Persist an updated report atomically.
    pub fn save_report(&self, report: &HaltReport) -> Result<(), HaltError> {
        let json = serde_json::to_string_pretty(report)?;
        self.write_atomic(&self.report_path(&report.id), json.as_bytes())
    }

    /// Release the switch: the pointer goes away, the report stays.
    pub fn release(&self, report: &HaltReport) -> Result<(), HaltError> {
        self.save_report(report)?;
        let pointer = self.pointer_path();
        std::fs::remove_file(&pointer).map_err(|source| HaltError::Io {
            path: pointer,
            source,
        })?;
        tracing::warn!(halt_id = %report.id, "kill-switch released");
        Ok(())
    }

    /// Write-temp-then-rename with fsync, under the halt directory.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), HaltError> {
        std::fs::create_dir_all(&self.halt_dir).map_err(|source| HaltError::Io {
            path: self.halt_dir.clone(),
            source,
        })?;
        let tmp = target.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        std::fs::write(&tmp, bytes).map_err(|source| HaltError::Io {
            path: tmp.clone(),
            source,
        })?;
        let file = std::fs::File::open(&tmp).map_err(|source| HaltError::Io {
            path: tmp.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| HaltError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, target).map_err(|source| HaltError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
