//! # warden-halt
//!
//! The kill-switch and its recovery protocol.
//!
//! When a CRITICAL, switch-triggering failure occurs — audit tamper, an
//! enforcement escape, an integrity violation — the server writes a halt
//! report, seals the audit journal, and from then on serves only read-only
//! tools. The halt state is a file, so it survives restarts. Only a human
//! Owner can clear it, through a two-step protocol: an acknowledged
//! `initiate` that issues a short-lived confirmation code, then a
//! constant-time `confirm` from the same session.

pub mod error;
pub mod failure;
pub mod killswitch;
pub mod recovery;

pub use error::HaltError;
pub use failure::{FailureId, FailureSpec, Severity};
pub use killswitch::{ConfirmationRecord, HaltReport, HaltTrigger, KillSwitch, RecoveryState};
pub use recovery::{OwnerAck, RecoveryChallenge, RecoveryGate, RECOVERY_CODE_TTL_SECS};
