// pipeline.rs — The ordered write gates.
//
// Full order, per the governance contract:
//
//   1. kill-switch          (dispatcher, before any tool runs)
//   2. session + prompt gate (dispatcher)
//   3. input validation      (schema, before dispatch reaches the handler)
//   4. plan binding          — here
//   5. scope resolution      — here
//   6. policy (stub + diff)  — here
//   7. preflight on staging  — here
//   8. atomic commit         — here
//   9. audit append          (dispatcher, for every outcome)
//
// Steps 4-7 have no side effect on the workspace; the first failure aborts
// with the tree untouched. Concurrent writes to the same target serialize
// on a per-path mutex so the second write's policy diff sees the first
// write's result, never a torn intermediate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use warden_plan::{AuthorizedPlan, PlanRegistry};
use warden_policy::check_write;
use warden_preflight::PreflightRunner;
use warden_session::Role;
use warden_workspace::WorkspaceScope;

use crate::error::GatewayError;

/// A fully schema-validated write request.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub path: String,
    pub content: String,
    pub plan: String,
    pub plan_id: String,
    pub plan_hash: String,
    pub role: Role,
    pub purpose: String,
    pub connected_via: String,
    pub registered_in: String,
    pub failure_modes: Vec<String>,
}

/// What a committed write looked like, for the audit entry and response.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Path relative to the workspace root.
    pub relative_path: PathBuf,
    pub plan: AuthorizedPlan,
    pub bytes_written: usize,
    /// True when an existing file was replaced.
    pub replaced: bool,
    /// Preflight summary for the audit notes.
    pub preflight: String,
}

/// Per-target-path serialization for concurrent connections.
#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("path lock table poisoned");
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Executes gates 4-8 for one write.
pub struct WritePipeline<'a> {
    pub scope: &'a WorkspaceScope,
    pub registry: &'a PlanRegistry,
    pub preflight: &'a PreflightRunner,
    pub locks: &'a PathLocks,
}

impl<'a> WritePipeline<'a> {
    pub fn execute(&self, request: &WriteRequest) -> Result<WriteOutcome, GatewayError> {
        // Gate 4: the plan triple must resolve to a single APPROVED document
        // whose bytes hash to the presented value, right now.
        let plan = self.registry.resolve(
            Some(&request.plan),
            Some(&request.plan_id),
            Some(&request.plan_hash),
        )?;

        // Gate 5: the target must land inside the governed root.
        let target = self.scope.resolve_write_target(&request.path)?;
        let relative = target
            .strip_prefix(self.scope.root())
            .map_err(|_| GatewayError::EnforcementViolation {
                message: format!(
                    "[write_pipeline] resolved target {} escaped the workspace root",
                    target.display()
                ),
            })?
            .to_path_buf();

        // First-come-first-served per target path.
        let path_lock = self.locks.lock_for(&target);
        let _guard = path_lock.lock().expect("path lock poisoned");

        // Gate 6: policy. The pre-write content is the diff baseline.
        let previous = match std::fs::read(&target) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(GatewayError::Internal {
                    message: format!(
                        "[write_pipeline] cannot read current content of {}: {}",
                        relative.display(),
                        err
                    ),
                })
            }
        };
        check_write(&relative, previous.as_deref(), &request.content)?;

        // Gate 7: preflight against a staged copy with this write applied.
        let verdict =
            self.preflight
                .run(self.scope.root(), &relative, request.content.as_bytes())?;

        // Gate 8: atomic commit — temp sibling, fsync, rename.
        self.commit(&target, request.content.as_bytes())?;

        // Post-commit enforcement check: the canonical committed path must
        // still be inside the root. Anything else is an escape that got
        // past the gate and must halt the server.
        let landed = target
            .canonicalize()
            .map_err(|err| GatewayError::Internal {
                message: format!("[write_pipeline] committed file unreadable: {}", err),
            })?;
        if !landed.starts_with(self.scope.root()) {
            return Err(GatewayError::EnforcementViolation {
                message: format!(
                    "[write_pipeline] committed file {} is outside the workspace root",
                    landed.display()
                ),
            });
        }

        // A write into docs/plans/ changes what the registry may serve.
        if relative.starts_with("docs/plans") {
            self.registry.invalidate();
        }

        tracing::info!(
            path = %relative.display(),
            plan_id = %plan.plan_id,
            bytes = request.content.len(),
            "write committed"
        );
        Ok(WriteOutcome {
            relative_path: relative,
            plan,
            bytes_written: request.content.len(),
            replaced: previous.is_some(),
            preflight: verdict.summary(),
        })
    }

    fn commit(&self, target: &Path, content: &[u8]) -> Result<(), GatewayError> {
        let parent = target.parent().ok_or_else(|| GatewayError::Internal {
            message: "[write_pipeline] target has no parent directory".to_string(),
        })?;
        std::fs::create_dir_all(parent).map_err(|err| GatewayError::Internal {
            message: format!("[write_pipeline] cannot create {}: {}", parent.display(), err),
        })?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "target".to_string());
        let tmp = parent.join(format!(".{}.tmp-{}", file_name, Uuid::new_v4().simple()));

        let write_result = (|| -> std::io::Result<()> {
            std::fs::write(&tmp, content)?;
            let file = std::fs::File::open(&tmp)?;
            file.sync_all()?;
            std::fs::rename(&tmp, target)?;
            Ok(())
        })();

        if let Err(err) = write_result {
            // Leave nothing behind on a failed commit.
            let _ = std::fs::remove_file(&tmp);
            return Err(GatewayError::Internal {
                message: format!(
                    "[write_pipeline] atomic commit to {} failed: {}",
                    target.display(),
                    err
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use warden_audit::hasher;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        scope: WorkspaceScope,
        registry: PlanRegistry,
        preflight: PreflightRunner,
        locks: PathLocks,
        plan_hash: String,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let plans = root.join("docs/plans");
        std::fs::create_dir_all(&plans).unwrap();
        let plan_body = "---\nplan_id: FOUNDATION-1\nstatus: APPROVED\n---\n# Foundation\n";
        std::fs::write(plans.join("FOUNDATION-1.md"), plan_body).unwrap();
        std::fs::create_dir_all(root.join(".governance/staging")).unwrap();

        Fixture {
            scope: WorkspaceScope::new(&root),
            registry: PlanRegistry::new(&root),
            preflight: PreflightRunner::new(
                root.join(".governance/preflight.toml"),
                root.join(".governance/staging"),
            ),
            locks: PathLocks::new(),
            plan_hash: hasher::hash_str(plan_body),
            root,
            _dir: dir,
        }
    }

    fn request(fixture: &Fixture, path: &str, content: &str) -> WriteRequest {
        WriteRequest {
            path: path.to_string(),
            content: content.to_string(),
            plan: "FOUNDATION-1.md".to_string(),
            plan_id: "FOUNDATION-1".to_string(),
            plan_hash: fixture.plan_hash.clone(),
            role: Role::Executor,
            purpose: "seed module".to_string(),
            connected_via: "src/app.js".to_string(),
            registered_in: "src/registry.js".to_string(),
            failure_modes: vec!["import cycle".to_string()],
        }
    }

    fn pipeline(fixture: &Fixture) -> WritePipeline<'_> {
        WritePipeline {
            scope: &fixture.scope,
            registry: &fixture.registry,
            preflight: &fixture.preflight,
            locks: &fixture.locks,
        }
    }

    #[test]
    fn bound_write_commits() {
        let fx = fixture();
        let outcome = pipeline(&fx)
            .execute(&request(&fx, "src/index.js", "export const a = 1;\n"))
            .unwrap();
        assert_eq!(outcome.plan.plan_id, "FOUNDATION-1");
        assert!(!outcome.replaced);
        assert_eq!(
            std::fs::read_to_string(fx.root.join("src/index.js")).unwrap(),
            "export const a = 1;\n"
        );
    }

    #[test]
    fn stale_plan_hash_blocks_before_any_side_effect() {
        let fx = fixture();
        let mut req = request(&fx, "src/index.js", "export const a = 1;\n");
        req.plan_hash = "0".repeat(64);
        let err = pipeline(&fx).execute(&req).unwrap_err();
        assert_eq!(err.code(), "PLAN_INTEGRITY_VIOLATION");
        assert!(!fx.root.join("src/index.js").exists());
    }

    #[test]
    fn traversal_blocks_with_no_file_created() {
        let fx = fixture();
        let req = request(&fx, "../../etc/passwd", "pwned\n");
        let err = pipeline(&fx).execute(&req).unwrap_err();
        assert_eq!(err.code(), "PATH_TRAVERSAL");
    }

    #[test]
    fn stub_content_blocks() {
        let fx = fixture();
        let req = request(&fx, "src/f.js", "export function f() { return undefined; }\n");
        let err = pipeline(&fx).execute(&req).unwrap_err();
        assert_eq!(err.code(), "POLICY_STUB_DETECTED");
        assert!(!fx.root.join("src/f.js").exists());
    }

    #[test]
    fn failing_preflight_leaves_tree_untouched() {
        let fx = fixture();
        std::fs::write(
            fx.root.join(".governance/preflight.toml"),
            "[checks.test]\ncommand = [\"sh\", \"-c\", \"exit 1\"]\n",
        )
        .unwrap();
        let err = pipeline(&fx)
            .execute(&request(&fx, "src/index.js", "export const a = 1;\n"))
            .unwrap_err();
        assert_eq!(err.code(), "PREFLIGHT_FAILED");
        assert!(!fx.root.join("src/index.js").exists());
    }

    #[test]
    fn rewrite_reports_replacement_and_diffs_against_old() {
        let fx = fixture();
        let p = pipeline(&fx);
        p.execute(&request(
            &fx,
            "src/f.js",
            "export function f(x) {\n  validateInput(x);\n  return x + 1;\n}\n",
        ))
        .unwrap();

        // Removing the guard is caught against the on-disk baseline.
        let err = p
            .execute(&request(
                &fx,
                "src/f.js",
                "export function f(x) {\n  return x + 1;\n}\n",
            ))
            .unwrap_err();
        assert_eq!(err.code(), "POLICY_REGRESSION_DETECTED");

        // A compliant rewrite replaces the file.
        let outcome = p
            .execute(&request(
                &fx,
                "src/f.js",
                "export function f(x) {\n  validateInput(x);\n  return x + 2;\n}\n",
            ))
            .unwrap();
        assert!(outcome.replaced);
    }

    #[test]
    fn no_temp_files_survive_a_commit() {
        let fx = fixture();
        pipeline(&fx)
            .execute(&request(&fx, "src/index.js", "export const a = 1;\n"))
            .unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(fx.root.join("src"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".tmp-")
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn plan_writes_invalidate_the_registry() {
        let fx = fixture();
        assert_eq!(fx.registry.list_plans().unwrap().len(), 1);
        pipeline(&fx)
            .execute(&request(
                &fx,
                "docs/plans/NEXT-1.md",
                "---\nplan_id: NEXT-1\nstatus: DRAFT\n---\n# Next\n",
            ))
            .unwrap();
        assert_eq!(fx.registry.list_plans().unwrap().len(), 2);
    }
}
