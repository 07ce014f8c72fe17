// manifest.rs — The declared-check manifest.
//
// `.governance/preflight.toml`:
//
//   [checks.test]
//   command = ["npm", "test"]
//   timeout_secs = 120
//
//   [checks.lint]
//   command = ["npx", "eslint", "."]
//
// Only the allowlisted check names are accepted. An absent file means the
// repository declares no checks.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::PreflightError;

/// The allowlisted check names, in execution order.
pub const CHECK_ORDER: &[&str] = &["test", "lint", "typecheck"];

/// Default per-check wall-clock timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// One declared check command.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSpec {
    /// Argv of the black-box subprocess; first element is the binary.
    pub command: Vec<String>,
    /// Wall-clock deadline for this check.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// The parsed manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreflightManifest {
    #[serde(default)]
    pub checks: BTreeMap<String, CheckSpec>,
}

impl PreflightManifest {
    /// Declared checks in `CHECK_ORDER`, skipping undeclared names.
    pub fn ordered_checks(&self) -> Vec<(&str, &CheckSpec)> {
        CHECK_ORDER
            .iter()
            .filter_map(|name| self.checks.get(*name).map(|spec| (*name, spec)))
            .collect()
    }
}

/// Load the manifest at `path`. `Ok(None)` when the file does not exist.
pub fn load_manifest(path: &Path) -> Result<Option<PreflightManifest>, PreflightError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PreflightError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let manifest: PreflightManifest =
        toml::from_str(&raw).map_err(|err| PreflightError::ManifestInvalid {
            reason: err.to_string(),
        })?;

    for (name, spec) in &manifest.checks {
        if !CHECK_ORDER.contains(&name.as_str()) {
            return Err(PreflightError::ManifestInvalid {
                reason: format!("unknown check '{}' (allowed: test, lint, typecheck)", name),
            });
        }
        if spec.command.is_empty() {
            return Err(PreflightError::ManifestInvalid {
                reason: format!("check '{}' declares an empty command", name),
            });
        }
    }

    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_manifest_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_manifest(&dir.path().join("preflight.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn parses_declared_checks_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preflight.toml");
        std::fs::write(
            &path,
            "[checks.lint]\ncommand = [\"eslint\", \".\"]\n\n[checks.test]\ncommand = [\"npm\", \"test\"]\ntimeout_secs = 30\n",
        )
        .unwrap();

        let manifest = load_manifest(&path).unwrap().unwrap();
        let ordered = manifest.ordered_checks();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].0, "test"); // test runs before lint
        assert_eq!(ordered[0].1.timeout_secs, 30);
        assert_eq!(ordered[1].1.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn unknown_check_names_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preflight.toml");
        std::fs::write(&path, "[checks.deploy]\ncommand = [\"sh\", \"-c\", \"true\"]\n").unwrap();
        assert!(matches!(
            load_manifest(&path),
            Err(PreflightError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preflight.toml");
        std::fs::write(&path, "[checks.test]\ncommand = []\n").unwrap();
        assert!(matches!(
            load_manifest(&path),
            Err(PreflightError::ManifestInvalid { .. })
        ));
    }
}
