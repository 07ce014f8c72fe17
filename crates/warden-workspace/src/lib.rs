//! # warden-workspace
//!
//! Governed-repository discovery and path scope enforcement.
//!
//! Every path that enters the system — read targets, write targets, plan
//! file names — passes through this crate. The resolver locates the governed
//! repository root (a directory carrying a version-control marker or a
//! `docs/plans/` directory), canonicalizes it once, and afterwards confines
//! every resolved path to that root. Traversal components are rejected
//! before any filesystem access happens.

pub mod error;
pub mod resolver;

pub use error::ScopeError;
pub use resolver::{resolve_repo_root, validate_plan_file_name, WorkspaceScope};
