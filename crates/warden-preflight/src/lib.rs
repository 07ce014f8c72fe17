//! # warden-preflight
//!
//! External check execution for the write pipeline.
//!
//! A repository declares up to three checks — `test`, `lint`, `typecheck` —
//! in `.governance/preflight.toml`. Before a write commits, the runner
//! copies the working tree into a staging directory, applies the proposed
//! write there, and runs each declared check as a black-box subprocess with
//! a hard wall-clock timeout. A non-zero exit or a timeout fails the write;
//! the real workspace is never touched by a failing candidate.
//!
//! Repositories with no declared checks skip preflight with a recorded
//! `NO_CHECKS_DECLARED` verdict.

pub mod error;
pub mod manifest;
pub mod runner;

pub use error::PreflightError;
pub use manifest::{load_manifest, CheckSpec, PreflightManifest, CHECK_ORDER};
pub use runner::{CheckOutcome, PreflightRunner, PreflightVerdict};
