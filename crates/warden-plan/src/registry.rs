// registry.rs — Plan discovery and binding resolution.
//
// The registry scans `<root>/docs/plans/*.md` (non-recursive), parses each
// header, and computes each document's SHA-256. Scans are cached against the
// directory mtime; a successful write into the plans directory invalidates
// the cache explicitly.
//
// Authorization is a triple binding: name + plan_id + plan_hash must all be
// present and agree with a single APPROVED document. The hash is recomputed
// from the file's bytes at the instant of resolution, never from the cache,
// so the binding pins exactly the content that was reviewed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Serialize;

use warden_audit::hasher;
use warden_workspace::validate_plan_file_name;

use crate::error::PlanError;
use crate::header::{parse_header, PlanStatus};

/// One discovered plan document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanRecord {
    /// File name under `docs/plans/` (e.g. "FOUNDATION-1.md").
    pub name: String,
    /// Declared identifier; `None` when the header is unparseable.
    pub plan_id: Option<String>,
    pub status: PlanStatus,
    /// SHA-256 of the file bytes at scan time, lowercase hex.
    pub hash: String,
    pub path: PathBuf,
}

/// The result of a successful triple-binding resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPlan {
    pub name: String,
    pub plan_id: String,
    /// Hash of the document at the instant of authorization.
    pub hash: String,
    pub path: PathBuf,
}

struct CachedScan {
    dir_mtime: SystemTime,
    records: Vec<PlanRecord>,
}

/// The single place in the system that parses plan documents.
pub struct PlanRegistry {
    plans_dir: PathBuf,
    cache: Mutex<Option<CachedScan>>,
}

impl PlanRegistry {
    /// Build a registry over `<workspace_root>/docs/plans/`.
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            plans_dir: workspace_root.as_ref().join("docs").join("plans"),
            cache: Mutex::new(None),
        }
    }

    /// The directory this registry scans.
    pub fn plans_dir(&self) -> &Path {
        &self.plans_dir
    }

    /// Drop the cached scan. Called after any successful write under
    /// `docs/plans/`.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    /// List all plan documents, sorted by file name.
    ///
    /// Unparseable documents are listed with `status = UNPARSEABLE` so they
    /// stay visible; they can never authorize a write. A duplicate plan_id
    /// across two parseable documents aborts the load.
    pub fn list_plans(&self) -> Result<Vec<PlanRecord>, PlanError> {
        let dir_mtime = match std::fs::metadata(&self.plans_dir) {
            Ok(meta) => meta.modified().ok(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PlanError::Io {
                    path: self.plans_dir.clone(),
                    source,
                })
            }
        };

        if let (Some(mtime), Ok(cache)) = (dir_mtime, self.cache.lock()) {
            if let Some(ref cached) = *cache {
                if cached.dir_mtime == mtime {
                    return Ok(cached.records.clone());
                }
            }
        }

        let records = self.scan()?;
        if let (Some(mtime), Ok(mut cache)) = (dir_mtime, self.cache.lock()) {
            *cache = Some(CachedScan {
                dir_mtime: mtime,
                records: records.clone(),
            });
        }
        Ok(records)
    }

    /// Look up a single record by file name (fresh parse, no cache).
    pub fn get_by_name(&self, name: &str) -> Result<Option<PlanRecord>, PlanError> {
        validate_plan_file_name(name).map_err(|_| PlanError::NotFound {
            reference: name.to_string(),
        })?;
        let path = self.plans_dir.join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Self::record_from_bytes(name, &path, &bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PlanError::Io { path, source }),
        }
    }

    /// Resolve a binding for authorization.
    ///
    /// All three of `name`, `plan_id`, and `plan_hash` must be present; the
    /// named document must parse, declare the presented id, be APPROVED, and
    /// hash (freshly, at this instant) to the presented hash.
    pub fn resolve(
        &self,
        name: Option<&str>,
        plan_id: Option<&str>,
        plan_hash: Option<&str>,
    ) -> Result<AuthorizedPlan, PlanError> {
        let name = name.ok_or(PlanError::BindingIncomplete { missing: "plan" })?;
        let plan_id = plan_id.ok_or(PlanError::BindingIncomplete { missing: "plan_id" })?;
        let plan_hash = plan_hash.ok_or(PlanError::BindingIncomplete {
            missing: "plan_hash",
        })?;

        // A full scan first: duplicate plan_ids abort every authorization.
        self.list_plans()?;

        let record = self
            .get_by_name(name)?
            .ok_or_else(|| PlanError::NotFound {
                reference: name.to_string(),
            })?;

        let declared = match record.plan_id {
            Some(ref id) => id.clone(),
            None => {
                return Err(PlanError::Unparseable {
                    name: name.to_string(),
                })
            }
        };
        if declared != plan_id {
            return Err(PlanError::IdMismatch {
                declared,
                presented: plan_id.to_string(),
            });
        }
        if record.status != PlanStatus::Approved {
            return Err(PlanError::NotApproved {
                plan_id: declared,
                status: record.status.to_string(),
            });
        }
        if record.hash != plan_hash {
            return Err(PlanError::IntegrityViolation {
                plan_id: declared,
                actual: record.hash,
                presented: plan_hash.to_string(),
            });
        }

        tracing::debug!(plan_id = %declared, name, "plan binding authorized");
        Ok(AuthorizedPlan {
            name: name.to_string(),
            plan_id: declared,
            hash: record.hash,
            path: record.path,
        })
    }

    fn scan(&self) -> Result<Vec<PlanRecord>, PlanError> {
        let entries = std::fs::read_dir(&self.plans_dir).map_err(|source| PlanError::Io {
            path: self.plans_dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PlanError::Io {
                path: self.plans_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue; // non-recursive by design
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if name.ends_with(".md") => name.to_string(),
                _ => continue,
            };
            let bytes = std::fs::read(&path).map_err(|source| PlanError::Io {
                path: path.clone(),
                source,
            })?;
            records.push(Self::record_from_bytes(&name, &path, &bytes));
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));

        // Uniqueness: two parseable documents must never share a plan_id.
        for (i, record) in records.iter().enumerate() {
            if let Some(ref id) = record.plan_id {
                for other in &records[i + 1..] {
                    if other.plan_id.as_deref() == Some(id.as_str()) {
                        return Err(PlanError::DuplicatePlanId {
                            plan_id: id.clone(),
                            first: record.name.clone(),
                            second: other.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(records)
    }

    fn record_from_bytes(name: &str, path: &Path, bytes: &[u8]) -> PlanRecord {
        let hash = hasher::hash_bytes(bytes);
        match parse_header(&String::from_utf8_lossy(bytes)) {
            Some(header) => PlanRecord {
                name: name.to_string(),
                plan_id: Some(header.plan_id),
                status: header.status,
                hash,
                path: path.to_path_buf(),
            },
            None => PlanRecord {
                name: name.to_string(),
                plan_id: None,
                status: PlanStatus::Unparseable,
                hash,
                path: path.to_path_buf(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_plan(root: &Path, name: &str, plan_id: &str, status: &str) -> String {
        let content = format!(
            "---\nplan_id: {}\nstatus: {}\n---\n# {}\n",
            plan_id, status, plan_id
        );
        let dir = root.join("docs/plans");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), &content).unwrap();
        hasher::hash_str(&content)
    }

    #[test]
    fn lists_plans_sorted_with_status() {
        let dir = tempdir().unwrap();
        write_plan(dir.path(), "b-plan.md", "B-1", "DRAFT");
        write_plan(dir.path(), "a-plan.md", "A-1", "APPROVED");

        let registry = PlanRegistry::new(dir.path());
        let plans = registry.list_plans().unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].name, "a-plan.md");
        assert_eq!(plans[0].status, PlanStatus::Approved);
        assert_eq!(plans[1].status, PlanStatus::Draft);
    }

    #[test]
    fn missing_plans_dir_lists_empty() {
        let dir = tempdir().unwrap();
        let registry = PlanRegistry::new(dir.path());
        assert!(registry.list_plans().unwrap().is_empty());
    }

    #[test]
    fn unparseable_document_is_visible_but_unauthorized() {
        let dir = tempdir().unwrap();
        let plans = dir.path().join("docs/plans");
        std::fs::create_dir_all(&plans).unwrap();
        std::fs::write(plans.join("broken.md"), "no header here\n").unwrap();

        let registry = PlanRegistry::new(dir.path());
        let records = registry.list_plans().unwrap();
        assert_eq!(records[0].status, PlanStatus::Unparseable);
        assert_eq!(records[0].plan_id, None);

        let hash = records[0].hash.clone();
        let result = registry.resolve(Some("broken.md"), Some("X"), Some(&hash));
        assert!(matches!(result, Err(PlanError::Unparseable { .. })));
    }

    #[test]
    fn duplicate_plan_id_aborts_load() {
        let dir = tempdir().unwrap();
        write_plan(dir.path(), "one.md", "SAME-1", "APPROVED");
        write_plan(dir.path(), "two.md", "SAME-1", "DRAFT");

        let registry = PlanRegistry::new(dir.path());
        assert!(matches!(
            registry.list_plans(),
            Err(PlanError::DuplicatePlanId { .. })
        ));
    }

    #[test]
    fn resolve_requires_all_three_fields() {
        let dir = tempdir().unwrap();
        let hash = write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());

        assert!(matches!(
            registry.resolve(None, Some("P-1"), Some(&hash)),
            Err(PlanError::BindingIncomplete { missing: "plan" })
        ));
        assert!(matches!(
            registry.resolve(Some("p.md"), None, Some(&hash)),
            Err(PlanError::BindingIncomplete { missing: "plan_id" })
        ));
        assert!(matches!(
            registry.resolve(Some("p.md"), Some("P-1"), None),
            Err(PlanError::BindingIncomplete { missing: "plan_hash" })
        ));
    }

    #[test]
    fn resolve_happy_path() {
        let dir = tempdir().unwrap();
        let hash = write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());

        let plan = registry
            .resolve(Some("p.md"), Some("P-1"), Some(&hash))
            .unwrap();
        assert_eq!(plan.plan_id, "P-1");
        assert_eq!(plan.hash, hash);
    }

    #[test]
    fn resolve_rejects_wrong_id() {
        let dir = tempdir().unwrap();
        let hash = write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());

        assert!(matches!(
            registry.resolve(Some("p.md"), Some("OTHER-1"), Some(&hash)),
            Err(PlanError::IdMismatch { .. })
        ));
    }

    #[test]
    fn resolve_rejects_stale_hash() {
        let dir = tempdir().unwrap();
        write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());

        let zeros = "0".repeat(64);
        assert!(matches!(
            registry.resolve(Some("p.md"), Some("P-1"), Some(&zeros)),
            Err(PlanError::IntegrityViolation { .. })
        ));
    }

    #[test]
    fn resolve_rejects_unapproved_status() {
        let dir = tempdir().unwrap();
        let hash = write_plan(dir.path(), "p.md", "P-1", "DRAFT");
        let registry = PlanRegistry::new(dir.path());

        assert!(matches!(
            registry.resolve(Some("p.md"), Some("P-1"), Some(&hash)),
            Err(PlanError::NotApproved { .. })
        ));
    }

    #[test]
    fn resolve_rehashes_at_authorization_time() {
        let dir = tempdir().unwrap();
        let old_hash = write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());
        registry.list_plans().unwrap(); // warm the cache

        // The document changes after the caller captured its hash.
        write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let plans_dir = dir.path().join("docs/plans");
        std::fs::write(
            plans_dir.join("p.md"),
            "---\nplan_id: P-1\nstatus: APPROVED\n---\n# edited\n",
        )
        .unwrap();

        let result = registry.resolve(Some("p.md"), Some("P-1"), Some(&old_hash));
        assert!(matches!(result, Err(PlanError::IntegrityViolation { .. })));
    }

    #[test]
    fn invalidate_forces_rescan() {
        let dir = tempdir().unwrap();
        write_plan(dir.path(), "p.md", "P-1", "APPROVED");
        let registry = PlanRegistry::new(dir.path());
        assert_eq!(registry.list_plans().unwrap().len(), 1);

        write_plan(dir.path(), "q.md", "Q-1", "DRAFT");
        registry.invalidate();
        assert_eq!(registry.list_plans().unwrap().len(), 2);
    }

    #[test]
    fn nested_directories_are_ignored() {
        let dir = tempdir().unwrap();
        write_plan(dir.path(), "top.md", "TOP-1", "APPROVED");
        let nested = dir.path().join("docs/plans/nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("inner.md"),
            "---\nplan_id: INNER-1\nstatus: APPROVED\n---\n",
        )
        .unwrap();

        let registry = PlanRegistry::new(dir.path());
        let plans = registry.list_plans().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "top.md");
    }
}
