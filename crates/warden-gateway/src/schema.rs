// schema.rs — Strict per-tool input validation.
//
// Every tool declares its required and optional fields with a type and an
// optional value validator. Dispatch refuses anything else: non-object
// args, unknown fields, missing required fields, wrong types, bad values —
// each with its own stable code. The schemas are data, not code, so the
// catalog below is the single place the tool surface is described.

use serde_json::Value;

use warden_audit::hasher::is_hex_digest;
use warden_plan::is_valid_plan_id;
use warden_session::Role;
use warden_workspace::validate_plan_file_name;

use crate::error::GatewayError;

/// JSON type expected for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Bool,
    UInt,
    Array,
    Object,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::UInt => value.is_u64(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Bool => "boolean",
            Self::UInt => "unsigned integer",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

type Validator = fn(&Value) -> Result<(), String>;

/// One declared field.
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub validate: Option<Validator>,
}

const fn req(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        validate: None,
    }
}

const fn reqv(name: &'static str, kind: FieldKind, validate: Validator) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        validate: Some(validate),
    }
}

/// A tool's full input contract.
pub struct ToolSchema {
    pub tool: &'static str,
    pub required: &'static [FieldSpec],
    pub optional: &'static [FieldSpec],
}

impl ToolSchema {
    /// Validate `args` strictly against this schema.
    pub fn validate(&self, args: &Value) -> Result<(), GatewayError> {
        let map = match args {
            Value::Object(map) => map,
            // Tools without arguments accept an omitted args object.
            Value::Null if self.required.is_empty() => return Ok(()),
            other => {
                return Err(GatewayError::InvalidInputType {
                    message: format!(
                        "args for '{}' must be an object, got {}",
                        self.tool,
                        json_type_name(other)
                    ),
                })
            }
        };

        // Strict: no fields beyond the declared contract.
        let mut unknown: Vec<String> = map
            .keys()
            .filter(|key| {
                !self.required.iter().any(|f| f.name == key.as_str())
                    && !self.optional.iter().any(|f| f.name == key.as_str())
            })
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(GatewayError::UnknownFields { fields: unknown });
        }

        for field in self.required {
            let value = map
                .get(field.name)
                .ok_or_else(|| GatewayError::MissingRequiredField {
                    field: field.name.to_string(),
                })?;
            check_field(field, value)?;
        }
        for field in self.optional {
            if let Some(value) = map.get(field.name) {
                check_field(field, value)?;
            }
        }
        Ok(())
    }
}

fn check_field(field: &FieldSpec, value: &Value) -> Result<(), GatewayError> {
    if !field.kind.matches(value) {
        return Err(GatewayError::InvalidInputType {
            message: format!(
                "field '{}' must be a {}, got {}",
                field.name,
                field.kind.name(),
                json_type_name(value)
            ),
        });
    }
    if let Some(validate) = field.validate {
        validate(value).map_err(|message| GatewayError::InvalidFieldValue {
            field: field.name.to_string(),
            message,
        })?;
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Field validators ─────────────────────────────────────────────

fn nonempty(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err("must be a non-empty string".to_string()),
    }
}

fn plan_file_name(value: &Value) -> Result<(), String> {
    let name = value.as_str().unwrap_or_default();
    validate_plan_file_name(name).map_err(|err| err.to_string())
}

fn plan_id(value: &Value) -> Result<(), String> {
    let id = value.as_str().unwrap_or_default();
    if is_valid_plan_id(id) {
        Ok(())
    } else {
        Err("must match ^[A-Za-z0-9._:-]{1,128}$".to_string())
    }
}

fn sha256_hex(value: &Value) -> Result<(), String> {
    let hash = value.as_str().unwrap_or_default();
    if is_hex_digest(hash) {
        Ok(())
    } else {
        Err("must be 64 lowercase hex characters".to_string())
    }
}

fn role_name(value: &Value) -> Result<(), String> {
    let raw = value.as_str().unwrap_or_default();
    Role::parse(raw)
        .map(|_| ())
        .ok_or_else(|| "must be PLANNER, EXECUTOR, or OWNER".to_string())
}

fn string_list(value: &Value) -> Result<(), String> {
    let items = value.as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        return Err("must list at least one entry".to_string());
    }
    for item in &items {
        match item.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err("entries must be non-empty strings".to_string()),
        }
    }
    Ok(())
}

fn rfc3339(value: &Value) -> Result<(), String> {
    let raw = value.as_str().unwrap_or_default();
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|_| ())
        .map_err(|_| "must be an RFC 3339 timestamp".to_string())
}

fn hex_code(value: &Value) -> Result<(), String> {
    let raw = value.as_str().unwrap_or_default();
    if raw.len() == 32 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err("must be 32 hex characters".to_string())
    }
}

// ── The tool catalog's schemas ───────────────────────────────────

static BEGIN_SESSION: ToolSchema = ToolSchema {
    tool: "begin_session",
    required: &[reqv("workspace_root", FieldKind::Str, nonempty)],
    optional: &[reqv("role", FieldKind::Str, role_name)],
};

static READ_PROMPT: ToolSchema = ToolSchema {
    tool: "read_prompt",
    required: &[],
    optional: &[reqv("name", FieldKind::Str, nonempty)],
};

static LIST_PLANS: ToolSchema = ToolSchema {
    tool: "list_plans",
    required: &[],
    optional: &[],
};

static READ_FILE: ToolSchema = ToolSchema {
    tool: "read_file",
    required: &[reqv("path", FieldKind::Str, nonempty)],
    optional: &[],
};

static READ_AUDIT_LOG: ToolSchema = ToolSchema {
    tool: "read_audit_log",
    required: &[],
    optional: &[req("limit", FieldKind::UInt)],
};

static WRITE_FILE: ToolSchema = ToolSchema {
    tool: "write_file",
    required: &[
        reqv("path", FieldKind::Str, nonempty),
        req("content", FieldKind::Str),
        reqv("plan", FieldKind::Str, plan_file_name),
        reqv("plan_id", FieldKind::Str, plan_id),
        reqv("plan_hash", FieldKind::Str, sha256_hex),
        reqv("role", FieldKind::Str, role_name),
        reqv("purpose", FieldKind::Str, nonempty),
        reqv("connected_via", FieldKind::Str, nonempty),
        reqv("registered_in", FieldKind::Str, nonempty),
        reqv("failure_modes", FieldKind::Array, string_list),
    ],
    optional: &[],
};

static LINT_PLAN: ToolSchema = ToolSchema {
    tool: "lint_plan",
    required: &[reqv("name", FieldKind::Str, plan_file_name)],
    optional: &[],
};

static VALIDATE_INTENTS: ToolSchema = ToolSchema {
    tool: "validate_intents",
    required: &[
        reqv("purpose", FieldKind::Str, nonempty),
        reqv("connected_via", FieldKind::Str, nonempty),
        reqv("registered_in", FieldKind::Str, nonempty),
        reqv("failure_modes", FieldKind::Array, string_list),
    ],
    optional: &[],
};

static VERIFY_WORKSPACE_INTEGRITY: ToolSchema = ToolSchema {
    tool: "verify_workspace_integrity",
    required: &[],
    optional: &[],
};

static BOOTSTRAP: ToolSchema = ToolSchema {
    tool: "bootstrap_create_foundation_plan",
    required: &[
        reqv("plan_name", FieldKind::Str, plan_file_name),
        reqv("content", FieldKind::Str, nonempty),
        reqv("repo_identifier", FieldKind::Str, nonempty),
        reqv("timestamp", FieldKind::Str, rfc3339),
        reqv("nonce", FieldKind::Str, nonempty),
        reqv("signature", FieldKind::Str, nonempty),
    ],
    optional: &[],
};

static RECOVERY_STATUS: ToolSchema = ToolSchema {
    tool: "recovery_status",
    required: &[],
    optional: &[],
};

static RECOVERY_INITIATE: ToolSchema = ToolSchema {
    tool: "recovery_initiate",
    required: &[
        req("owner_ack", FieldKind::Object),
        reqv("reason", FieldKind::Str, nonempty),
    ],
    optional: &[],
};

static RECOVERY_CONFIRM: ToolSchema = ToolSchema {
    tool: "recovery_confirm",
    required: &[reqv("code", FieldKind::Str, hex_code)],
    optional: &[],
};

/// The schema for a tool name, if the tool exists at all.
pub fn schema_for(tool: &str) -> Option<&'static ToolSchema> {
    match tool {
        "begin_session" => Some(&BEGIN_SESSION),
        "read_prompt" => Some(&READ_PROMPT),
        "list_plans" => Some(&LIST_PLANS),
        "read_file" => Some(&READ_FILE),
        "read_audit_log" => Some(&READ_AUDIT_LOG),
        "write_file" => Some(&WRITE_FILE),
        "lint_plan" => Some(&LINT_PLAN),
        "validate_intents" => Some(&VALIDATE_INTENTS),
        "verify_workspace_integrity" => Some(&VERIFY_WORKSPACE_INTEGRITY),
        "bootstrap_create_foundation_plan" => Some(&BOOTSTRAP),
        "recovery_status" => Some(&RECOVERY_STATUS),
        "recovery_initiate" => Some(&RECOVERY_INITIATE),
        "recovery_confirm" => Some(&RECOVERY_CONFIRM),
        _ => None,
    }
}
