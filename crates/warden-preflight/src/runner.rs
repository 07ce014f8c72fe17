// runner.rs — Staged execution of declared checks.
//
// The runner never executes anything against the real working tree. It
// copies the tree into `.governance/staging/<id>/` (excluding `.governance`
// itself and the VCS directory), applies the candidate write there, and runs
// each declared check inside the copy. Check output goes to temp files
// rather than pipes, so a chatty subprocess cannot deadlock the poll loop;
// only a bounded tail of each stream is kept.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::PreflightError;
use crate::manifest::{load_manifest, CheckSpec};

/// Bytes of stdout/stderr tail kept per check.
const OUTPUT_TAIL_BYTES: usize = 16 * 1024;

/// Poll interval while waiting on a check subprocess.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default ceiling across all checks of one preflight run.
pub const DEFAULT_OVERALL_CEILING_SECS: u64 = 300;

/// Outcome of one executed check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub exit_code: i32,
    pub duration_ms: u128,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

/// Aggregate verdict of a preflight run.
#[derive(Debug, Clone)]
pub enum PreflightVerdict {
    /// The repository declares no checks; recorded, not fatal.
    NoChecksDeclared,
    /// Every declared check passed.
    Passed { checks: Vec<CheckOutcome> },
}

impl PreflightVerdict {
    /// Short note for the audit entry.
    pub fn summary(&self) -> String {
        match self {
            Self::NoChecksDeclared => "NO_CHECKS_DECLARED".to_string(),
            Self::Passed { checks } => format!(
                "preflight passed: {}",
                checks
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        }
    }
}

/// Runs declared checks against a staging copy of the working tree.
pub struct PreflightRunner {
    manifest_path: PathBuf,
    staging_root: PathBuf,
    overall_ceiling: Duration,
}

impl PreflightRunner {
    /// `manifest_path` is `.governance/preflight.toml`; `staging_root` is the
    /// directory staging copies are created under (`.governance/staging/`).
    pub fn new(manifest_path: impl Into<PathBuf>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            staging_root: staging_root.into(),
            overall_ceiling: Duration::from_secs(DEFAULT_OVERALL_CEILING_SECS),
        }
    }

    /// Override the across-all-checks ceiling.
    pub fn with_overall_ceiling(mut self, ceiling: Duration) -> Self {
        self.overall_ceiling = ceiling;
        self
    }

    /// Stage the tree with `candidate_rel` replaced by `candidate_content`
    /// and run every declared check there.
    pub fn run(
        &self,
        workspace_root: &Path,
        candidate_rel: &Path,
        candidate_content: &[u8],
    ) -> Result<PreflightVerdict, PreflightError> {
        let manifest = match load_manifest(&self.manifest_path)? {
            Some(manifest) if !manifest.checks.is_empty() => manifest,
            _ => {
                tracing::info!("no preflight checks declared; skipping");
                return Ok(PreflightVerdict::NoChecksDeclared);
            }
        };

        let staging_dir = self.staging_root.join(Uuid::new_v4().to_string());
        let result = self.run_in_staging(
            &staging_dir,
            workspace_root,
            candidate_rel,
            candidate_content,
            &manifest.ordered_checks(),
        );
        // The staging copy is disposable either way.
        let _ = std::fs::remove_dir_all(&staging_dir);
        result
    }

    fn run_in_staging(
        &self,
        staging_dir: &Path,
        workspace_root: &Path,
        candidate_rel: &Path,
        candidate_content: &[u8],
        checks: &[(&str, &CheckSpec)],
    ) -> Result<PreflightVerdict, PreflightError> {
        copy_tree(workspace_root, staging_dir)?;

        let candidate_path = staging_dir.join(candidate_rel);
        if let Some(parent) = candidate_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PreflightError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&candidate_path, candidate_content).map_err(|source| PreflightError::Io {
            path: candidate_path.clone(),
            source,
        })?;

        let started = Instant::now();
        let mut outcomes = Vec::new();
        for (name, spec) in checks {
            let elapsed = started.elapsed();
            let remaining = self.overall_ceiling.saturating_sub(elapsed);
            if remaining.is_zero() {
                return Err(PreflightError::CheckTimedOut {
                    check: name.to_string(),
                    timeout_secs: 0,
                });
            }
            let deadline = remaining.min(Duration::from_secs(spec.timeout_secs));
            let outcome = run_check(staging_dir, name, spec, deadline)?;
            tracing::info!(
                check = name,
                exit_code = outcome.exit_code,
                duration_ms = outcome.duration_ms as u64,
                "preflight check passed"
            );
            outcomes.push(outcome);
        }

        Ok(PreflightVerdict::Passed { checks: outcomes })
    }
}

/// Run one check to completion or deadline. Non-zero exit is an error.
fn run_check(
    staging_dir: &Path,
    name: &str,
    spec: &CheckSpec,
    deadline: Duration,
) -> Result<CheckOutcome, PreflightError> {
    let stdout_path = staging_dir.join(format!(".preflight-{}-stdout", name));
    let stderr_path = staging_dir.join(format!(".preflight-{}-stderr", name));
    let stdout_file = File::create(&stdout_path).map_err(|source| PreflightError::Io {
        path: stdout_path.clone(),
        source,
    })?;
    let stderr_file = File::create(&stderr_path).map_err(|source| PreflightError::Io {
        path: stderr_path.clone(),
        source,
    })?;

    let started = Instant::now();
    let mut child = Command::new(&spec.command[0])
        .args(&spec.command[1..])
        .current_dir(staging_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .map_err(|source| PreflightError::SpawnFailed {
            check: name.to_string(),
            source,
        })?;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PreflightError::CheckTimedOut {
                        check: name.to_string(),
                        timeout_secs: deadline.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(PreflightError::SpawnFailed {
                    check: name.to_string(),
                    source,
                });
            }
        }
    };

    let stdout_tail = read_tail(&stdout_path);
    let stderr_tail = read_tail(&stderr_path);

    match status.code() {
        Some(0) => Ok(CheckOutcome {
            name: name.to_string(),
            exit_code: 0,
            duration_ms: started.elapsed().as_millis(),
            stdout_tail,
            stderr_tail,
        }),
        code => Err(PreflightError::CheckFailed {
            check: name.to_string(),
            exit_code: code,
            stderr_tail,
        }),
    }
}

/// Last `OUTPUT_TAIL_BYTES` of a capture file, lossily decoded.
fn read_tail(path: &Path) -> String {
    let bytes = std::fs::read(path).unwrap_or_default();
    let start = bytes.len().saturating_sub(OUTPUT_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).to_string()
}

/// Copy the working tree, excluding `.governance` and the VCS directory.
fn copy_tree(from: &Path, to: &Path) -> Result<(), PreflightError> {
    std::fs::create_dir_all(to).map_err(|source| PreflightError::Io {
        path: to.to_path_buf(),
        source,
    })?;
    let entries = std::fs::read_dir(from).map_err(|source| PreflightError::Io {
        path: from.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| PreflightError::Io {
            path: from.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if name == ".governance" || name == ".git" {
            continue;
        }
        let src = entry.path();
        let dst = to.join(&name);
        if src.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst).map_err(|source| PreflightError::Io {
                path: src.clone(),
                source,
            })?;
        }
    }
    Ok(())
}
