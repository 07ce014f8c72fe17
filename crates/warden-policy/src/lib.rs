//! # warden-policy
//!
//! The policy engine behind every write: two independent gates, both of
//! which must pass before content may land in the governed repository.
//!
//! The **stub gate** parses ECMAScript-family sources into a syntax tree and
//! rejects hollow implementations on added or modified lines: empty bodies,
//! trivial returns, swallowed exceptions, placeholder markers, and
//! type-checker silencing. The **regression gate** compares the proposed
//! content against what is currently on disk and rejects diffs that remove
//! guard calls or comment out previously-executing code.
//!
//! Parsing is fail-closed: content the parser cannot understand is rejected,
//! never waved through.

pub mod diff;
pub mod engine;
pub mod error;
pub mod regression;
pub mod stub;

pub use engine::{check_write, SourceKind};
pub use error::PolicyError;
