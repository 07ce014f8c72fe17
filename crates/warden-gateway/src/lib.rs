//! # warden-gateway
//!
//! The mediation core: a role-scoped tool dispatcher in front of a governed
//! repository. Every request passes the same gate sequence — kill-switch,
//! role catalog, session and prompt gate, strict schema validation — before
//! its handler runs, and every dispatch leaves exactly one entry in the
//! hash-chained audit journal. Writes additionally pass plan binding, scope
//! resolution, the policy engine, and preflight before an atomic commit.
//!
//! The gateway is transport-agnostic: it consumes decoded [`ToolRequest`]
//! objects and produces [`ToolResponse`] objects. Framing (line-delimited
//! stdio, HTTP) belongs to the transport adapter.

pub mod bootstrap;
pub mod config;
pub mod env;
pub mod error;
pub mod governance;
pub mod maturity;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod schema;
pub mod server;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use governance::{GovernanceState, GovernanceStore};
pub use maturity::Scorecard;
pub use request::{ErrorBody, ToolRequest, ToolResponse};
pub use server::{StartupError, WardenServer};
