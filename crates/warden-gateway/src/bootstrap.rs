// bootstrap.rs — One-shot, HMAC-signed creation of the foundation plan.
//
// A fresh repository has no approved plan, so nothing can authorize a
// write — including the write that would create the first plan. Bootstrap
// breaks that cycle exactly once: the holder of the out-of-band secret
// signs a canonical payload naming the repository, a timestamp inside a
// five-minute window, and a nonce. After one success the gate closes
// permanently (`bootstrap_enabled = false`) and only ordinary governed
// writes remain.

use chrono::{DateTime, Utc};
use ring::hmac;
use serde_json::{json, Value};
use uuid::Uuid;

use warden_plan::{parse_header, PlanRegistry, PlanStatus};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::governance::{GovernanceState, GovernanceStore};

/// The only action bootstrap signatures cover.
pub const BOOTSTRAP_ACTION: &str = "BOOTSTRAP_CREATE_FOUNDATION_PLAN";

/// Accepted clock skew, either direction.
pub const TIMESTAMP_WINDOW_SECS: i64 = 300;

/// Validated bootstrap arguments (schema-checked upstream).
#[derive(Debug, Clone)]
pub struct BootstrapArgs {
    pub plan_name: String,
    pub content: String,
    pub repo_identifier: String,
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
}

/// The canonical payload the signature covers.
pub fn signing_payload(repo_identifier: &str, timestamp: &str, nonce: &str) -> String {
    warden_audit::canonical_json(&json!({
        "action": BOOTSTRAP_ACTION,
        "nonce": nonce,
        "repo_identifier": repo_identifier,
        "timestamp": timestamp,
    }))
}

/// Sign a payload with the bootstrap secret (hex output). The operator-side
/// counterpart of `verify_signature`.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, payload.as_bytes());
    tag.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
}

fn verify_signature(secret: &str, payload: &str, signature_hex: &str) -> bool {
    let Some(signature) = hex_decode(signature_hex) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    // ring's verify is constant-time over the tag comparison.
    hmac::verify(&key, payload.as_bytes(), &signature).is_ok()
}

fn hex_decode(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

/// Execute a bootstrap request end to end.
pub fn execute(
    config: &GatewayConfig,
    governance: &GovernanceStore,
    registry: &PlanRegistry,
    secret: Option<&str>,
    args: &BootstrapArgs,
) -> Result<Value, GatewayError> {
    // Single use: the gate is closed once anything has been approved.
    let state = governance.load()?;
    if !state.bootstrap_enabled || state.approved_plans_count > 0 {
        return Err(GatewayError::BootstrapDisabled);
    }

    let secret = secret.ok_or_else(|| GatewayError::BootstrapSignatureInvalid {
        message: "no bootstrap secret configured".to_string(),
    })?;

    // Freshness window.
    let presented: DateTime<Utc> = DateTime::parse_from_rfc3339(&args.timestamp)
        .map_err(|_| GatewayError::BootstrapSignatureInvalid {
            message: "timestamp is not RFC 3339".to_string(),
        })?
        .with_timezone(&Utc);
    let skew = (Utc::now() - presented).num_seconds().abs();
    if skew > TIMESTAMP_WINDOW_SECS {
        return Err(GatewayError::BootstrapSignatureInvalid {
            message: format!("timestamp outside ±{}s window", TIMESTAMP_WINDOW_SECS),
        });
    }

    let payload = signing_payload(&args.repo_identifier, &args.timestamp, &args.nonce);
    if !verify_signature(secret, &payload, &args.signature) {
        return Err(GatewayError::BootstrapSignatureInvalid {
            message: "HMAC verification failed".to_string(),
        });
    }

    // The supplied document must itself be an APPROVED plan.
    let header = parse_header(&args.content).ok_or_else(|| GatewayError::InvalidFieldValue {
        field: "content".to_string(),
        message: "content has no parseable plan header".to_string(),
    })?;
    if header.status != PlanStatus::Approved {
        return Err(GatewayError::InvalidFieldValue {
            field: "content".to_string(),
            message: format!("foundation plan must be APPROVED, got {}", header.status),
        });
    }

    let target = config.plans_dir.join(&args.plan_name);
    if target.exists() {
        return Err(GatewayError::InvalidFieldValue {
            field: "plan_name".to_string(),
            message: format!("plan '{}' already exists", args.plan_name),
        });
    }

    // Land the plan atomically, then flip the state.
    std::fs::create_dir_all(&config.plans_dir).map_err(|err| GatewayError::Internal {
        message: format!("[bootstrap] cannot create plans dir: {}", err),
    })?;
    let tmp = config
        .plans_dir
        .join(format!(".{}.tmp-{}", args.plan_name, Uuid::new_v4().simple()));
    std::fs::write(&tmp, args.content.as_bytes()).map_err(|err| GatewayError::Internal {
        message: format!("[bootstrap] write failed: {}", err),
    })?;
    let file = std::fs::File::open(&tmp).map_err(|err| GatewayError::Internal {
        message: format!("[bootstrap] fsync open failed: {}", err),
    })?;
    file.sync_all().map_err(|err| GatewayError::Internal {
        message: format!("[bootstrap] fsync failed: {}", err),
    })?;
    std::fs::rename(&tmp, &target).map_err(|err| GatewayError::Internal {
        message: format!("[bootstrap] rename failed: {}", err),
    })?;

    governance.save(&GovernanceState {
        bootstrap_enabled: false,
        approved_plans_count: 1,
    })?;
    registry.invalidate();

    let plan_hash = warden_audit::hasher::hash_str(&args.content);
    tracing::info!(plan = %args.plan_name, plan_id = %header.plan_id, "foundation plan bootstrapped");
    Ok(json!({
        "plan": args.plan_name,
        "plan_id": header.plan_id,
        "plan_hash": plan_hash,
        "bootstrap_enabled": false,
    }))
}
