// recovery.rs — The two-step recovery gate.
//
// Step 1, `initiate`: requires all three owner acknowledgements literally
// true and a non-empty reason, then issues a 16-byte random confirmation
// code (hex) with a 10-minute TTL, persisted inside the halt report along
// with the initiating session id.
//
// Step 2, `confirm`: constant-time comparison of the presented code, same
// session as step 1, within the TTL. One failed or expired confirm burns
// the challenge — a fresh initiate is required. Every attempt, either way,
// lands in the report's confirmations array; the journal is sealed while
// halted, so the report is the audit record of the protocol itself.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use ring::constant_time;
use serde::{Deserialize, Serialize};

use crate::error::HaltError;
use crate::killswitch::{ConfirmationRecord, HaltReport, RecoveryState};

/// Lifetime of an issued confirmation code.
pub const RECOVERY_CODE_TTL_SECS: i64 = 600;

/// The acknowledgements an Owner must make before a code is issued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OwnerAck {
    pub read_halt_report: bool,
    pub ran_verification: bool,
    pub accept_responsibility: bool,
}

impl OwnerAck {
    fn complete(&self) -> bool {
        self.read_halt_report && self.ran_verification && self.accept_responsibility
    }
}

/// An outstanding confirmation challenge, persisted in the halt report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryChallenge {
    /// 32 lowercase hex chars (16 random bytes).
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Session that ran initiate; confirm must come from the same one.
    pub session_id: String,
    pub reason: String,
}

/// Pure protocol logic over a halt report. Persistence and journal
/// succession stay with the caller, which owns those resources.
pub struct RecoveryGate {
    ttl: Duration,
}

impl Default for RecoveryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryGate {
    pub fn new() -> Self {
        Self {
            ttl: Duration::seconds(RECOVERY_CODE_TTL_SECS),
        }
    }

    /// Override the TTL (tests).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Step 1: validate acknowledgements and issue a confirmation code.
    pub fn initiate(
        &self,
        report: &mut HaltReport,
        ack: OwnerAck,
        reason: &str,
        session_id: &str,
    ) -> Result<String, HaltError> {
        if report.recovery_state == RecoveryState::Cleared {
            return Err(HaltError::NotEngaged);
        }
        if !ack.complete() {
            report.confirmations.push(ConfirmationRecord {
                at: Utc::now(),
                event: "initiate".to_string(),
                outcome: "rejected: incomplete acknowledgements".to_string(),
                session_id: session_id.to_string(),
            });
            return Err(HaltError::NotAuthorized {
                reason: "all three acknowledgements must be true".to_string(),
            });
        }
        if reason.trim().is_empty() {
            report.confirmations.push(ConfirmationRecord {
                at: Utc::now(),
                event: "initiate".to_string(),
                outcome: "rejected: empty reason".to_string(),
                session_id: session_id.to_string(),
            });
            return Err(HaltError::NotAuthorized {
                reason: "a non-empty reason is required".to_string(),
            });
        }

        let code = generate_code();
        let issued_at = Utc::now();
        report.challenge = Some(RecoveryChallenge {
            code: code.clone(),
            issued_at,
            expires_at: issued_at + self.ttl,
            session_id: session_id.to_string(),
            reason: reason.to_string(),
        });
        report.recovery_state = RecoveryState::Pending;
        report.confirmations.push(ConfirmationRecord {
            at: issued_at,
            event: "initiate".to_string(),
            outcome: "issued".to_string(),
            session_id: session_id.to_string(),
        });
        tracing::warn!(halt_id = %report.id, "recovery initiated; confirmation code issued");
        Ok(code)
    }

    /// Step 2: verify the presented code. Success marks the report CLEARED;
    /// any failure burns the outstanding challenge.
    pub fn confirm(
        &self,
        report: &mut HaltReport,
        presented: &str,
        session_id: &str,
    ) -> Result<(), HaltError> {
        let challenge = match report.challenge.take() {
            Some(challenge) => challenge,
            None => {
                report.confirmations.push(ConfirmationRecord {
                    at: Utc::now(),
                    event: "confirm".to_string(),
                    outcome: "rejected: no pending challenge".to_string(),
                    session_id: session_id.to_string(),
                });
                return Err(HaltError::CodeInvalid);
            }
        };
        // The challenge is consumed no matter what happens below.
        report.recovery_state = RecoveryState::Locked;

        if Utc::now() > challenge.expires_at {
            report.confirmations.push(ConfirmationRecord {
                at: Utc::now(),
                event: "confirm".to_string(),
                outcome: "rejected: code expired".to_string(),
                session_id: session_id.to_string(),
            });
            return Err(HaltError::CodeExpired);
        }
        if challenge.session_id != session_id {
            report.confirmations.push(ConfirmationRecord {
                at: Utc::now(),
                event: "confirm".to_string(),
                outcome: "rejected: different session than initiate".to_string(),
                session_id: session_id.to_string(),
            });
            return Err(HaltError::NotAuthorized {
                reason: "confirm must come from the initiating session".to_string(),
            });
        }
        if !codes_match(&challenge.code, presented) {
            report.confirmations.push(ConfirmationRecord {
                at: Utc::now(),
                event: "confirm".to_string(),
                outcome: "rejected: code mismatch".to_string(),
                session_id: session_id.to_string(),
            });
            return Err(HaltError::CodeInvalid);
        }

        report.recovery_state = RecoveryState::Cleared;
        report.confirmations.push(ConfirmationRecord {
            at: Utc::now(),
            event: "confirm".to_string(),
            outcome: "cleared".to_string(),
            session_id: session_id.to_string(),
        });
        tracing::warn!(halt_id = %report.id, "recovery confirmed");
        Ok(())
    }
}

/// 16 cryptographically random bytes, lowercase hex.
fn generate_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time code comparison. A wrong-length code still burns a
/// comparison against the real code so length is the only thing it learns.
fn codes_match(expected: &str, presented: &str) -> bool {
    if expected.len() != presented.len() {
        let _ = constant_time::verify_slices_are_equal(expected.as_bytes(), expected.as_bytes());
        return false;
    }
    constant_time::verify_slices_are_equal(expected.as_bytes(), presented.as_bytes()).is_ok()
}
