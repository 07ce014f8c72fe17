// env.rs — Sandboxed environment access.
//
// The core may read exactly five environment variables. Every lookup in the
// workspace goes through `read_env`, which refuses names outside the
// allowlist — there is no other call to std::env::var in the libraries, so
// the allowlist is enforced by construction and checked again at startup by
// the sandbox self-check.

/// Role selector (PLANNER / EXECUTOR / OWNER).
pub const ENV_ROLE: &str = "WARDEN_ROLE";
/// Advisory session identifier supplied by the launcher.
pub const ENV_SESSION_ID: &str = "WARDEN_SESSION_ID";
/// Sandbox-enabled flag.
pub const ENV_SANDBOX: &str = "WARDEN_SANDBOX";
/// Bootstrap HMAC secret; read only by the bootstrap tool.
pub const ENV_BOOTSTRAP_SECRET: &str = "WARDEN_BOOTSTRAP_SECRET";
/// Log level for the tracing subscriber.
pub const ENV_LOG: &str = "WARDEN_LOG";

/// The full allowlist.
pub const ENV_ALLOWLIST: &[&str] = &[
    ENV_ROLE,
    ENV_SESSION_ID,
    ENV_SANDBOX,
    ENV_BOOTSTRAP_SECRET,
    ENV_LOG,
];

/// Read an allowlisted environment variable. Names outside the allowlist
/// return `None` unconditionally.
pub fn read_env(name: &str) -> Option<String> {
    if !ENV_ALLOWLIST.contains(&name) {
        tracing::warn!(name, "refused environment read outside allowlist");
        return None;
    }
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Startup sandbox self-check.
///
/// Verifies the invariants the sandbox depends on: the allowlist names are
/// distinct and prefixed, and the governance directory can be created under
/// the workspace root. A failure here means the process must exit with
/// code 10 rather than serve.
pub fn sandbox_check(governance_dir: &std::path::Path) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for name in ENV_ALLOWLIST {
        if !name.starts_with("WARDEN_") {
            return Err(format!("allowlist entry '{}' is not namespaced", name));
        }
        if !seen.insert(name) {
            return Err(format!("allowlist entry '{}' is duplicated", name));
        }
    }

    std::fs::create_dir_all(governance_dir)
        .map_err(|err| format!("governance dir {} unusable: {}", governance_dir.display(), err))?;
    Ok(())
}
