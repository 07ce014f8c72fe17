// config.rs — Gateway configuration.
//
// GatewayConfig fixes where governance state lives relative to the resolved
// workspace root. The `for_workspace()` constructor derives the standard
// layout under `.governance/`; nothing else in the system hardcodes a path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for a gateway serving one governed repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Canonical root of the governed repository.
    pub workspace_root: PathBuf,

    /// Governance directory (`<root>/.governance/`).
    pub governance_dir: PathBuf,

    /// Append-only audit journal.
    pub audit_log: PathBuf,

    /// Halt reports and the `current` pointer.
    pub halt_dir: PathBuf,

    /// Governance state file (bootstrap flag, approved-plan count).
    pub governance_state: PathBuf,

    /// Declared preflight checks.
    pub preflight_manifest: PathBuf,

    /// Staging copies for preflight runs.
    pub staging_dir: PathBuf,

    /// Plan documents.
    pub plans_dir: PathBuf,
}

impl GatewayConfig {
    /// Create a config with the standard `.governance/` layout for a root.
    pub fn for_workspace(workspace_root: impl AsRef<Path>) -> Self {
        let root = workspace_root.as_ref().to_path_buf();
        let governance_dir = root.join(".governance");
        Self {
            workspace_root: root.clone(),
            audit_log: governance_dir.join("audit-log.jsonl"),
            halt_dir: governance_dir.join("halt"),
            governance_state: governance_dir.join("governance.json"),
            preflight_manifest: governance_dir.join("preflight.toml"),
            staging_dir: governance_dir.join("staging"),
            plans_dir: root.join("docs").join("plans"),
            governance_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_off_the_root() {
        let config = GatewayConfig::for_workspace("/repo");
        assert_eq!(config.governance_dir, PathBuf::from("/repo/.governance"));
        assert_eq!(
            config.audit_log,
            PathBuf::from("/repo/.governance/audit-log.jsonl")
        );
        assert_eq!(config.plans_dir, PathBuf::from("/repo/docs/plans"));
        assert_eq!(config.halt_dir, PathBuf::from("/repo/.governance/halt"));
    }
}
