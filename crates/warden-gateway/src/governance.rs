// governance.rs — The governance state file.
//
// `.governance/governance.json` holds the two fields the bootstrap gate
// needs: whether bootstrap is still enabled, and how many approved plans
// exist. A missing file is the fresh-repository state (bootstrap enabled,
// zero plans). Updates are write-temp-then-rename with fsync.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

/// Persisted governance state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovernanceState {
    pub bootstrap_enabled: bool,
    pub approved_plans_count: u64,
}

impl Default for GovernanceState {
    fn default() -> Self {
        // A fresh repository: bootstrap is open, nothing approved yet.
        Self {
            bootstrap_enabled: true,
            approved_plans_count: 0,
        }
    }
}

/// Loads and persists the governance state file.
pub struct GovernanceStore {
    path: PathBuf,
}

impl GovernanceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state; a missing file is the default fresh state.
    pub fn load(&self) -> Result<GovernanceState, GatewayError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| GatewayError::Internal {
                message: format!("[governance] state file corrupt: {}", err),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(GovernanceState::default())
            }
            Err(err) => Err(GatewayError::Internal {
                message: format!("[governance] state file unreadable: {}", err),
            }),
        }
    }

    /// Persist atomically: temp sibling, fsync, rename.
    pub fn save(&self, state: &GovernanceState) -> Result<(), GatewayError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| GatewayError::Internal {
                message: format!("[governance] cannot create {}: {}", parent.display(), err),
            })?;
        }
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        let json = serde_json::to_string_pretty(state).map_err(|err| GatewayError::Internal {
            message: format!("[governance] serialize failed: {}", err),
        })?;
        let write_err = |err: std::io::Error| GatewayError::Internal {
            message: format!("[governance] write failed at {}: {}", tmp.display(), err),
        };
        std::fs::write(&tmp, json).map_err(write_err)?;
        let file = std::fs::File::open(&tmp).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(|err| GatewayError::Internal {
            message: format!("[governance] rename failed at {}: {}", self.path.display(), err),
        })?;
        Ok(())
    }
}
