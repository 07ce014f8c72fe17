//! # warden-audit
//!
//! Hash-chained, append-only audit journal for Warden.
//!
//! Every tool dispatch — success, error, or blocked — is recorded as an
//! [`AuditEntry`] in a JSONL journal. Each entry carries the SHA-256 hash of
//! its predecessor, so inserting, deleting, or editing any line is detectable
//! by [`Journal::verify_chain`]. The journal can be sealed (safe-halt), after
//! which it refuses further appends until a successor file is opened through
//! the recovery protocol.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use warden_audit::{EntryDraft, EntryResult, Journal};
//!
//! let journal = Journal::open("/tmp/audit-log.jsonl");
//! let draft = EntryDraft::new("sess-1", "EXECUTOR", "/repo", "read_file", "digest")
//!     .with_result(EntryResult::Ok);
//! journal.append(draft).unwrap();
//! ```

pub mod canonical;
pub mod entry;
pub mod error;
pub mod hasher;
pub mod journal;

pub use canonical::{args_digest, canonical_json};
pub use entry::{AuditEntry, EntryDraft, EntryResult, GENESIS_HASH, SEAL_TOOL};
pub use error::AuditError;
pub use journal::{ChainReport, Journal};
