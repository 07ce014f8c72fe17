// server.rs — The gateway server: role-scoped dispatch over the governance
// components.
//
// One WardenServer serves one connection. All durable state — the journal,
// the plan documents, the governance file, the halt directory — lives on
// disk under the workspace root, so concurrent connections (and restarts)
// coordinate through the filesystem, not through shared memory.
//
// Dispatch order for every request:
//
//   kill-switch → role catalog → session + prompt gate → schema → handler
//
// and exactly one audit entry per dispatch while the journal is live. When
// the switch is engaged the journal is sealed; the halt report carries the
// record of recovery traffic until the successor journal opens.

use chrono::Utc;
use serde_json::{json, Value};

use warden_audit::{args_digest, EntryDraft, EntryResult, Journal};
use warden_halt::{FailureId, KillSwitch, OwnerAck, RecoveryGate, RecoveryState};
use warden_plan::{PlanRegistry, PlanStatus};
use warden_preflight::{load_manifest, PreflightRunner};
use warden_session::{Role, SessionError, SessionStore};
use warden_workspace::{resolve_repo_root, WorkspaceScope};

use crate::bootstrap::{self, BootstrapArgs};
use crate::config::GatewayConfig;
use crate::env;
use crate::error::GatewayError;
use crate::governance::GovernanceStore;
use crate::maturity;
use crate::pipeline::{PathLocks, WritePipeline, WriteRequest};
use crate::prompt;
use crate::request::{ToolRequest, ToolResponse};
use crate::schema::schema_for;

/// Why startup must refuse to serve, with the process exit code.
#[derive(Debug)]
pub enum StartupError {
    /// Exit 10 — sandbox self-check failed.
    SandboxFailed(String),
    /// Exit 20 — the audit chain does not verify.
    AuditInvalid { first_bad_sequence: u64 },
    /// Exit 30 — a halt file exists but cannot be read.
    HaltUnreadable(String),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SandboxFailed(_) => 10,
            Self::AuditInvalid { .. } => 20,
            Self::HaltUnreadable(_) => 30,
        }
    }
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SandboxFailed(reason) => write!(f, "sandbox integrity check failed: {}", reason),
            Self::AuditInvalid { first_bad_sequence } => {
                write!(f, "audit chain invalid at sequence {}", first_bad_sequence)
            }
            Self::HaltUnreadable(reason) => write!(f, "halt file unreadable: {}", reason),
        }
    }
}

/// Tools served while the kill-switch is engaged.
const HALTED_CATALOG: &[&str] = &[
    "begin_session",
    "read_prompt",
    "list_plans",
    "read_file",
    "read_audit_log",
    "recovery_status",
    "recovery_initiate",
    "recovery_confirm",
];

/// Tools exempt from the prompt gate.
const GATE_EXEMPT: &[&str] = &["begin_session", "read_prompt"];

fn catalog(role: Role) -> &'static [&'static str] {
    const PLANNER: &[&str] = &[
        "begin_session",
        "list_plans",
        "read_file",
        "read_audit_log",
        "read_prompt",
        "bootstrap_create_foundation_plan",
        "lint_plan",
        "validate_intents",
        "verify_workspace_integrity",
    ];
    const EXECUTOR: &[&str] = &[
        "begin_session",
        "list_plans",
        "read_file",
        "read_audit_log",
        "read_prompt",
        "write_file",
    ];
    const OWNER: &[&str] = &[
        "begin_session",
        "list_plans",
        "read_file",
        "read_audit_log",
        "read_prompt",
        "bootstrap_create_foundation_plan",
        "lint_plan",
        "validate_intents",
        "verify_workspace_integrity",
        "recovery_status",
        "recovery_initiate",
        "recovery_confirm",
    ];
    match role {
        Role::Planner => PLANNER,
        Role::Executor => EXECUTOR,
        Role::Owner => OWNER,
    }
}

/// What a handler produced, before the audit entry is written.
struct ToolOutcome {
    result: Value,
    /// Plan binding to record on the audit entry (writes only).
    plan: Option<(String, String)>,
    /// Free-text note for the audit entry.
    notes: Option<String>,
}

impl ToolOutcome {
    fn plain(result: Value) -> Self {
        Self {
            result,
            plan: None,
            notes: None,
        }
    }
}

/// The gateway server for one connection to one governed repository.
pub struct WardenServer {
    config: GatewayConfig,
    role: Role,
    scope: WorkspaceScope,
    journal: Journal,
    registry: PlanRegistry,
    governance: GovernanceStore,
    killswitch: KillSwitch,
    recovery: RecoveryGate,
    preflight: PreflightRunner,
    locks: PathLocks,
    sessions: SessionStore,
}

impl WardenServer {
    /// Resolve the governed root from `hint` and assemble the components.
    pub fn new(hint: &std::path::Path, role: Role) -> Result<Self, GatewayError> {
        let root = resolve_repo_root(hint)?;
        let config = GatewayConfig::for_workspace(&root);
        Ok(Self {
            role,
            scope: WorkspaceScope::new(&root),
            journal: Journal::open(&config.audit_log),
            registry: PlanRegistry::new(&root),
            governance: GovernanceStore::new(&config.governance_state),
            killswitch: KillSwitch::new(&config.halt_dir),
            recovery: RecoveryGate::new(),
            preflight: PreflightRunner::new(&config.preflight_manifest, &config.staging_dir),
            locks: PathLocks::new(),
            sessions: SessionStore::new(),
            config,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Startup integrity checks, in the order the exit codes demand:
    /// halt state first, then the sandbox, then the audit chain.
    pub fn startup_check(&self) -> Result<(), StartupError> {
        if let Err(err) = self.killswitch.current_report() {
            return Err(StartupError::HaltUnreadable(err.to_string()));
        }
        if let Err(reason) = env::sandbox_check(&self.config.governance_dir) {
            return Err(StartupError::SandboxFailed(reason));
        }
        match self.journal.verify_chain() {
            Ok(report) if report.valid => Ok(()),
            Ok(report) => Err(StartupError::AuditInvalid {
                first_bad_sequence: report.first_bad_sequence.unwrap_or(0),
            }),
            Err(err) => {
                tracing::error!(error = %err, "audit chain unreadable at startup");
                Err(StartupError::AuditInvalid {
                    first_bad_sequence: 0,
                })
            }
        }
    }

    /// Dispatch one request and return the wire response. Infallible at
    /// this level: every failure becomes an error response.
    pub fn dispatch(&mut self, request: ToolRequest) -> ToolResponse {
        let digest = args_digest(&request.args);
        let halted = self.killswitch.is_engaged();
        let started = std::time::Instant::now();

        let outcome = self.dispatch_inner(&request, halted);
        self.sessions.next_sequence();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(outcome) => {
                if !halted {
                    self.append_audit(&request.tool, &digest, EntryResult::Ok, None, &outcome);
                }
                tracing::debug!(tool = %request.tool, elapsed_ms, "dispatch ok");
                ToolResponse::ok(request.id, outcome.result)
            }
            Err(err) => {
                let result = if err.is_blocked() {
                    EntryResult::Blocked
                } else {
                    EntryResult::Error
                };
                if !halted {
                    let empty = ToolOutcome::plain(Value::Null);
                    self.append_audit(&request.tool, &digest, result, Some(&err), &empty);
                    self.engage_if_critical(&err);
                }
                tracing::warn!(tool = %request.tool, code = err.code(), elapsed_ms, "dispatch refused");
                ToolResponse::err(request.id, err.to_body())
            }
        }
    }

    fn dispatch_inner(
        &mut self,
        request: &ToolRequest,
        halted: bool,
    ) -> Result<ToolOutcome, GatewayError> {
        let tool = request.tool.as_str();
        let schema = schema_for(tool).ok_or_else(|| GatewayError::InvalidFieldValue {
            field: "tool".to_string(),
            message: format!("unknown tool '{}'", tool),
        })?;

        // Gate 1: the kill-switch restricts the catalog to reads + recovery.
        if halted && !HALTED_CATALOG.contains(&tool) {
            return Err(GatewayError::KillSwitchEngaged);
        }

        // Role catalog: a tool outside the process role's catalog is an
        // enforcement refusal, not an unknown tool.
        if !catalog(self.role).contains(&tool) {
            return Err(GatewayError::ToolNotAllowed {
                tool: tool.to_string(),
                role: self.role.to_string(),
            });
        }

        // Gate 2: session and prompt, for everything but the bootstrap pair.
        if !GATE_EXEMPT.contains(&tool) {
            self.sessions.require_prompt_fetched()?;
        }

        // Gate 3: strict input validation.
        schema.validate(&request.args)?;

        match tool {
            "begin_session" => self.tool_begin_session(&request.args),
            "read_prompt" => self.tool_read_prompt(&request.args),
            "list_plans" => self.tool_list_plans(),
            "read_file" => self.tool_read_file(&request.args),
            "read_audit_log" => self.tool_read_audit_log(&request.args),
            "write_file" => self.tool_write_file(&request.args),
            "lint_plan" => self.tool_lint_plan(&request.args),
            "validate_intents" => self.tool_validate_intents(&request.args),
            "verify_workspace_integrity" => self.tool_verify_workspace_integrity(),
            "bootstrap_create_foundation_plan" => self.tool_bootstrap(&request.args),
            "recovery_status" => self.tool_recovery_status(),
            "recovery_initiate" => self.tool_recovery_initiate(&request.args),
            "recovery_confirm" => self.tool_recovery_confirm(&request.args),
            other => Err(GatewayError::InvalidFieldValue {
                field: "tool".to_string(),
                message: format!("unknown tool '{}'", other),
            }),
        }
    }

    // ── Session tools ────────────────────────────────────────────

    fn tool_begin_session(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        if let Some(requested) = args.get("role").and_then(Value::as_str) {
            let requested_role = Role::parse(requested).ok_or_else(|| {
                GatewayError::InvalidFieldValue {
                    field: "role".to_string(),
                    message: "must be PLANNER, EXECUTOR, or OWNER".to_string(),
                }
            })?;
            if requested_role != self.role {
                return Err(GatewayError::Session(SessionError::RoleMismatch {
                    requested: requested_role.to_string(),
                    bound: self.role.to_string(),
                }));
            }
        }

        let hint = args
            .get("workspace_root")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let resolved = resolve_repo_root(hint)?;
        // A bound connection presenting a different root is its own error,
        // whatever root this server happens to govern.
        if let Some(existing) = self.sessions.session() {
            if existing.workspace_root != resolved {
                return Err(GatewayError::Session(SessionError::AlreadyBound {
                    bound: existing.workspace_root.clone(),
                }));
            }
        }
        if resolved != self.config.workspace_root {
            return Err(GatewayError::InvalidFieldValue {
                field: "workspace_root".to_string(),
                message: format!(
                    "resolves to {}, but this server governs {}",
                    resolved.display(),
                    self.config.workspace_root.display()
                ),
            });
        }

        let session = self.sessions.begin_session(&resolved, self.role)?;
        Ok(ToolOutcome::plain(json!({
            "session_id": session.id,
            "role": session.role.to_string(),
            "workspace_root": session.workspace_root.display().to_string(),
            "prompt_fetched": session.prompt_fetched,
        })))
    }

    fn tool_read_prompt(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        self.sessions.require_session()?;
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(prompt::CANONICAL_PROMPT_NAME);
        let content = prompt::prompt_by_name(name).ok_or_else(|| GatewayError::InvalidFieldValue {
            field: "name".to_string(),
            message: format!("unrecognized prompt '{}'", name),
        })?;
        self.sessions.mark_prompt_fetched()?;
        Ok(ToolOutcome::plain(json!({
            "name": name,
            "content": content,
        })))
    }

    // ── Read tools ───────────────────────────────────────────────

    fn tool_list_plans(&mut self) -> Result<ToolOutcome, GatewayError> {
        let plans = self.registry.list_plans()?;
        let items: Vec<Value> = plans
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "plan_id": p.plan_id,
                    "status": p.status.to_string(),
                    "hash": p.hash,
                })
            })
            .collect();
        Ok(ToolOutcome::plain(json!({
            "plans": items,
            "count": items.len(),
        })))
    }

    fn tool_read_file(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let raw = args.get("path").and_then(Value::as_str).unwrap_or_default();
        let target = self.scope.resolve_read_target(raw)?;
        let bytes = std::fs::read(&target).map_err(|err| GatewayError::InvalidFieldValue {
            field: "path".to_string(),
            message: format!("cannot read '{}': {}", raw, err),
        })?;
        Ok(ToolOutcome::plain(json!({
            "path": raw,
            "content": String::from_utf8_lossy(&bytes),
        })))
    }

    fn tool_read_audit_log(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(50) as usize;
        let entries = self.journal.read_tail(limit)?;
        let entries = serde_json::to_value(&entries).map_err(|err| GatewayError::Internal {
            message: format!("[read_audit_log] serialize failed: {}", err),
        })?;
        Ok(ToolOutcome::plain(json!({ "entries": entries })))
    }

    // ── The write pipeline ───────────────────────────────────────

    fn tool_write_file(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let str_field = |name: &str| -> String {
            args.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let role = Role::parse(&str_field("role")).ok_or_else(|| {
            GatewayError::InvalidFieldValue {
                field: "role".to_string(),
                message: "must be PLANNER, EXECUTOR, or OWNER".to_string(),
            }
        })?;
        if role != self.role {
            return Err(GatewayError::Session(SessionError::RoleMismatch {
                requested: role.to_string(),
                bound: self.role.to_string(),
            }));
        }

        let request = WriteRequest {
            path: str_field("path"),
            content: str_field("content"),
            plan: str_field("plan"),
            plan_id: str_field("plan_id"),
            plan_hash: str_field("plan_hash"),
            role,
            purpose: str_field("purpose"),
            connected_via: str_field("connected_via"),
            registered_in: str_field("registered_in"),
            failure_modes: args
                .get("failure_modes")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        let pipeline = WritePipeline {
            scope: &self.scope,
            registry: &self.registry,
            preflight: &self.preflight,
            locks: &self.locks,
        };
        let outcome = pipeline.execute(&request)?;

        Ok(ToolOutcome {
            result: json!({
                "path": outcome.relative_path.display().to_string(),
                "bytes_written": outcome.bytes_written,
                "replaced": outcome.replaced,
                "plan_id": outcome.plan.plan_id,
                "plan_hash": outcome.plan.hash,
                "preflight": outcome.preflight,
            }),
            plan: Some((outcome.plan.plan_id.clone(), outcome.plan.hash.clone())),
            notes: Some(format!(
                "{}; purpose: {}",
                outcome.preflight, request.purpose
            )),
        })
    }

    // ── Plan inspection tools ────────────────────────────────────

    fn tool_lint_plan(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
        let record = self
            .registry
            .get_by_name(name)?
            .ok_or_else(|| GatewayError::InvalidFieldValue {
                field: "name".to_string(),
                message: format!("no plan named '{}'", name),
            })?;

        let mut findings: Vec<String> = Vec::new();
        match record.status {
            PlanStatus::Unparseable => {
                findings.push("header does not parse: expected a `---`-delimited block with plan_id and status".to_string());
            }
            status => {
                let raw = std::fs::read_to_string(&record.path).unwrap_or_default();
                if let Some(header) = warden_plan::parse_header(&raw) {
                    if header.authority.is_none() {
                        findings.push("header has no authority field".to_string());
                    }
                    if header.scope.is_none() {
                        findings.push("header has no scope field".to_string());
                    }
                }
                if status == PlanStatus::Draft {
                    findings.push("plan is DRAFT; it cannot authorize writes".to_string());
                }
                if status == PlanStatus::Archived {
                    findings.push("plan is ARCHIVED; it cannot authorize writes".to_string());
                }
            }
        }

        Ok(ToolOutcome::plain(json!({
            "name": record.name,
            "plan_id": record.plan_id,
            "status": record.status.to_string(),
            "hash": record.hash,
            "findings": findings,
        })))
    }

    fn tool_validate_intents(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        // Presence and types are schema-checked; this pass judges substance.
        let mut findings: Vec<String> = Vec::new();
        let purpose = args.get("purpose").and_then(Value::as_str).unwrap_or_default();
        if purpose.trim().len() < 8 {
            findings.push("purpose is too vague; describe what the change accomplishes".to_string());
        }
        let registered_in = args
            .get("registered_in")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let registry_exists = self
            .scope
            .resolve_read_target(registered_in)
            .map(|p| p.exists())
            .unwrap_or(false);
        if !registry_exists {
            findings.push(format!(
                "registered_in '{}' does not name an existing file",
                registered_in
            ));
        }
        let modes: Vec<&str> = args
            .get("failure_modes")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut seen = std::collections::HashSet::new();
        for mode in &modes {
            if !seen.insert(mode.trim()) {
                findings.push(format!("failure mode '{}' is listed twice", mode));
            }
        }

        Ok(ToolOutcome::plain(json!({
            "valid": findings.is_empty(),
            "findings": findings,
        })))
    }

    // ── Integrity & maturity ─────────────────────────────────────

    fn tool_verify_workspace_integrity(&mut self) -> Result<ToolOutcome, GatewayError> {
        let report = self.journal.verify_chain()?;
        if !report.valid {
            // Tamper engages the switch via the dispatch error hook.
            return Err(GatewayError::AuditTampered {
                first_bad_sequence: report.first_bad_sequence.unwrap_or(0),
            });
        }

        let state = self.governance.load()?;
        let plans = self.registry.list_plans()?;
        let declared = load_manifest(&self.config.preflight_manifest)?
            .map(|m| m.checks.len())
            .unwrap_or(0);
        let entries = self.journal.read_all()?;
        let scorecard = maturity::score(&entries, &plans, declared);

        Ok(ToolOutcome::plain(json!({
            "audit": {
                "valid": report.valid,
                "entries": report.entries,
                "sealed": report.sealed,
                "final_hash": report.final_hash,
            },
            "governance": {
                "bootstrap_enabled": state.bootstrap_enabled,
                "approved_plans_count": state.approved_plans_count,
            },
            "plan_count": plans.len(),
            "maturity": serde_json::to_value(scorecard).unwrap_or(Value::Null),
        })))
    }

    fn tool_bootstrap(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let str_field = |name: &str| -> String {
            args.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let bootstrap_args = BootstrapArgs {
            plan_name: str_field("plan_name"),
            content: str_field("content"),
            repo_identifier: str_field("repo_identifier"),
            timestamp: str_field("timestamp"),
            nonce: str_field("nonce"),
            signature: str_field("signature"),
        };
        let secret = env::read_env(env::ENV_BOOTSTRAP_SECRET);
        let result = bootstrap::execute(
            &self.config,
            &self.governance,
            &self.registry,
            secret.as_deref(),
            &bootstrap_args,
        )?;
        let plan_id = result
            .get("plan_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let plan_hash = result
            .get("plan_hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(ToolOutcome {
            result,
            plan: Some((plan_id, plan_hash)),
            notes: Some("foundation plan bootstrapped".to_string()),
        })
    }

    // ── Recovery tools ───────────────────────────────────────────

    fn tool_recovery_status(&mut self) -> Result<ToolOutcome, GatewayError> {
        match self.killswitch.current_report()? {
            None => Ok(ToolOutcome::plain(json!({ "engaged": false }))),
            Some(report) => Ok(ToolOutcome::plain(json!({
                "engaged": true,
                "halt_id": report.id,
                "engaged_at": report.engaged_at.to_rfc3339(),
                "recovery_state": report.recovery_state,
                "trigger": report.trigger,
                "sealing_hash": report.sealing_hash,
                "attempts": report.confirmations.len(),
                "summary": report.summary,
                "recommended_checks": report.recommended_checks,
            }))),
        }
    }

    fn tool_recovery_initiate(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let session_id = self.sessions.require_session()?.id.clone();
        let mut report = self
            .killswitch
            .current_report()?
            .ok_or(GatewayError::Halt(warden_halt::HaltError::NotEngaged))?;

        let ack_obj = args.get("owner_ack").cloned().unwrap_or(Value::Null);
        let ack_bool = |name: &str| -> Result<bool, GatewayError> {
            ack_obj
                .get(name)
                .and_then(Value::as_bool)
                .ok_or_else(|| GatewayError::InvalidFieldValue {
                    field: format!("owner_ack.{}", name),
                    message: "must be a boolean".to_string(),
                })
        };
        let ack = OwnerAck {
            read_halt_report: ack_bool("read_halt_report")?,
            ran_verification: ack_bool("ran_verification")?,
            accept_responsibility: ack_bool("accept_responsibility")?,
        };
        let reason = args.get("reason").and_then(Value::as_str).unwrap_or_default();

        let issued = self
            .recovery
            .initiate(&mut report, ack, reason, &session_id);
        // Rejected attempts are part of the record too.
        self.killswitch.save_report(&report)?;
        let code = issued.map_err(GatewayError::from)?;
        let expires_at = report
            .challenge
            .as_ref()
            .map(|c| c.expires_at.to_rfc3339());

        Ok(ToolOutcome {
            result: json!({
                "confirmation_code": code,
                "expires_at": expires_at,
                "recovery_state": RecoveryState::Pending,
            }),
            plan: None,
            notes: Some("recovery initiated".to_string()),
        })
    }

    fn tool_recovery_confirm(&mut self, args: &Value) -> Result<ToolOutcome, GatewayError> {
        let session = self.sessions.require_session()?;
        let session_id = session.id.clone();
        let mut report = self
            .killswitch
            .current_report()?
            .ok_or(GatewayError::Halt(warden_halt::HaltError::NotEngaged))?;

        // The sealed chain must verify before the switch may clear.
        let chain = self.journal.verify_chain()?;
        if !chain.valid {
            return Err(GatewayError::AuditTampered {
                first_bad_sequence: chain.first_bad_sequence.unwrap_or(0),
            });
        }

        let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
        let confirmed = self.recovery.confirm(&mut report, code, &session_id);
        self.killswitch.save_report(&report)?;
        confirmed.map_err(GatewayError::from)?;

        // Open the successor journal with the RECOVERY entry linking back
        // to the sealing hash, then release the switch.
        let draft = EntryDraft::new(
            session_id,
            self.role.to_string(),
            self.config.workspace_root.display().to_string(),
            "RECOVERY",
            args_digest(&json!({ "halt_id": report.id })),
        )
        .with_result(EntryResult::Ok)
        .with_notes(format!("kill-switch released for {}", report.id));
        self.journal.succeed_sealed(&report.id, draft)?;
        self.killswitch.release(&report)?;

        Ok(ToolOutcome::plain(json!({
            "recovery_state": RecoveryState::Cleared,
            "halt_id": report.id,
        })))
    }

    // ── Audit & kill-switch plumbing ─────────────────────────────

    fn append_audit(
        &mut self,
        tool: &str,
        digest: &str,
        result: EntryResult,
        err: Option<&GatewayError>,
        outcome: &ToolOutcome,
    ) {
        let session_id = self
            .sessions
            .session()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| "-".to_string());
        let mut draft = EntryDraft::new(
            session_id,
            self.role.to_string(),
            self.config.workspace_root.display().to_string(),
            tool,
            digest,
        )
        .with_result(result);
        if let Some((plan_id, plan_hash)) = &outcome.plan {
            draft = draft.with_plan(plan_id.clone(), plan_hash.clone());
        }
        if let Some(notes) = &outcome.notes {
            draft = draft.with_notes(notes.clone());
        }
        if let Some(err) = err {
            draft = draft
                .with_error_code(err.code())
                .with_notes(err.to_string());
        }

        if let Err(append_err) = self.journal.append(draft) {
            // Losing the audit trail is itself a halt-worthy failure.
            tracing::error!(error = %append_err, "audit append failed");
            self.engage(
                vec![FailureId::Audit],
                format!("audit append failed: {}", append_err),
            );
        }
    }

    fn engage_if_critical(&mut self, err: &GatewayError) {
        let failure = err.failure_id();
        if failure.engages_kill_switch() {
            self.engage(vec![failure], err.to_string());
        }
    }

    /// Engage the kill-switch: HALT entry, seal, halt report.
    fn engage(&mut self, failure_ids: Vec<FailureId>, reason: String) {
        if self.killswitch.is_engaged() {
            return;
        }
        let session_id = self
            .sessions
            .session()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| "-".to_string());
        let root = self.config.workspace_root.display().to_string();

        let halt_draft = EntryDraft::new(
            session_id.as_str(),
            self.role.to_string(),
            root.as_str(),
            "HALT",
            "-",
        )
        .with_result(EntryResult::Blocked)
        .with_notes(reason.clone());
        if let Err(err) = self.journal.append(halt_draft) {
            tracing::error!(error = %err, "HALT entry could not be appended");
        }

        let seal_draft = EntryDraft::new(
            session_id.as_str(),
            self.role.to_string(),
            root.as_str(),
            "SEAL",
            "-",
        )
        .with_result(EntryResult::Blocked)
        .with_notes("journal sealed by kill-switch".to_string());
        let sealing_hash = match self.journal.seal(seal_draft) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!(error = %err, "journal seal failed during engagement");
                self.journal
                    .last_hash()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "UNKNOWN".to_string())
            }
        };

        let ts = Utc::now().to_rfc3339();
        match self.killswitch.engage(failure_ids, reason.clone(), sealing_hash) {
            Ok(report) => {
                tracing::error!(halt_id = %report.id, at = %ts, "kill-switch engaged by dispatcher")
            }
            Err(err) => tracing::error!(error = %err, "kill-switch engagement failed"),
        }
    }

    /// A connection dropped mid-request: record it, per the cancellation
    /// contract. Committed writes have already been audited; this marks the
    /// abandoned request itself.
    pub fn record_disconnect(&mut self, tool: &str) {
        if self.killswitch.is_engaged() {
            return;
        }
        let empty = ToolOutcome::plain(Value::Null);
        self.append_audit(
            tool,
            "-",
            EntryResult::Blocked,
            Some(&GatewayError::ClientDisconnected),
            &empty,
        );
    }
}
