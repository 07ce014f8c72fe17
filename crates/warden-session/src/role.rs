// role.rs — Process role binding.
//
// The process is launched as exactly one role; the role fixes the tool
// catalog for every connection it serves. There is no in-band privilege
// escalation: changing role means restarting the process.

use serde::{Deserialize, Serialize};

/// The three process roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Plans, lints, and inspects; never writes repository files.
    Planner,
    /// Executes writes under an approved plan binding.
    Executor,
    /// Planner powers plus the recovery administration tools.
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "PLANNER",
            Self::Executor => "EXECUTOR",
            Self::Owner => "OWNER",
        }
    }

    /// Parse the startup selector value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLANNER" => Some(Self::Planner),
            "EXECUTOR" => Some(Self::Executor),
            "OWNER" => Some(Self::Owner),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
