//! # warden-plan
//!
//! Plan discovery, identity, and integrity binding.
//!
//! A Plan is a Markdown document under `docs/plans/` whose leading header
//! (delimited by two `---` lines) declares at least a `plan_id` and a
//! `status`. The registry is the only component in the system that parses
//! plans; everything else consumes [`PlanRecord`]s and the triple-binding
//! resolution in [`PlanRegistry::resolve`]: a write is authorized only when
//! the caller presents a plan name, a `plan_id`, and a `plan_hash` that all
//! agree with a single APPROVED document on disk, hashed at the instant of
//! authorization.

pub mod error;
pub mod header;
pub mod registry;

pub use error::PlanError;
pub use header::{is_valid_plan_id, parse_header, PlanHeader, PlanStatus};
pub use registry::{AuthorizedPlan, PlanRecord, PlanRegistry};
