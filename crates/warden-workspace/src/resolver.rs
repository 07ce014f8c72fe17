// resolver.rs — Repository root discovery and path scoping.
//
// Two jobs:
// 1. Find the governed repository: walk upward from a hint directory until
//    one carries a `.git` marker or a `docs/plans/` directory.
// 2. Scope paths: normalize a caller-supplied read/write target and refuse
//    anything that does not land strictly inside the root.
//
// Scoping is deliberately layered. The lexical pass rejects any `..`
// component before touching the filesystem; the containment pass then
// canonicalizes the deepest existing ancestor so symlinks cannot smuggle a
// path back out of the root.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ScopeError;

/// Plan file names: 1-128 chars of [A-Za-z0-9._-] ending in `.md`, no
/// separators, no leading dot.
static PLAN_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn plan_name_re() -> &'static Regex {
    PLAN_NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._-]{1,128}\.md$").expect("plan name pattern is valid")
    })
}

/// Walk upward from `hint` until a directory carries a governance marker:
/// a `.git` entry (directory, or file for linked worktrees) or a
/// `docs/plans/` directory. Returns the canonicalized root.
pub fn resolve_repo_root(hint: impl AsRef<Path>) -> Result<PathBuf, ScopeError> {
    let hint = hint.as_ref();
    let start = hint.canonicalize().map_err(|source| ScopeError::Io {
        path: hint.to_path_buf(),
        source,
    })?;

    let mut current: Option<&Path> = Some(start.as_path());
    while let Some(dir) = current {
        if dir.join(".git").exists() || dir.join("docs").join("plans").is_dir() {
            tracing::debug!(root = %dir.display(), "governed repository resolved");
            return Ok(dir.to_path_buf());
        }
        current = dir.parent();
    }

    Err(ScopeError::NoGovernedRepoFound {
        hint: hint.to_path_buf(),
    })
}

/// Validate a plan document file name against the allowed grammar.
pub fn validate_plan_file_name(name: &str) -> Result<(), ScopeError> {
    let invalid = || ScopeError::InvalidPlanName {
        name: name.to_string(),
    };
    if name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(invalid());
    }
    if !plan_name_re().is_match(name) {
        return Err(invalid());
    }
    Ok(())
}

/// A canonicalized workspace root and the scoping rules around it.
///
/// Immutable for the lifetime of a session; created once at startup and
/// injected into every component that touches the filesystem.
#[derive(Debug, Clone)]
pub struct WorkspaceScope {
    root: PathBuf,
}

impl WorkspaceScope {
    /// Build a scope around an already-resolved root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a write target. Relative paths resolve against the root;
    /// absolute paths must already live under it. The result is guaranteed
    /// to be inside the root even in the presence of symlinked ancestors.
    pub fn resolve_write_target(&self, raw: &str) -> Result<PathBuf, ScopeError> {
        self.resolve_target(raw)
    }

    /// Resolve a read target. Reads outside the repository are rejected
    /// exactly like writes.
    pub fn resolve_read_target(&self, raw: &str) -> Result<PathBuf, ScopeError> {
        self.resolve_target(raw)
    }

    fn resolve_target(&self, raw: &str) -> Result<PathBuf, ScopeError> {
        if raw.is_empty() {
            return Err(ScopeError::PathOutsideRepo {
                path: raw.to_string(),
            });
        }

        let candidate = Path::new(raw);
        let mut normalized = if candidate.is_absolute() {
            PathBuf::new()
        } else {
            self.root.clone()
        };

        // Lexical pass: refuse `..` outright, drop `.`, keep the rest.
        for component in candidate.components() {
            match component {
                Component::ParentDir => {
                    return Err(ScopeError::PathTraversal {
                        path: raw.to_string(),
                    });
                }
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => {
                    normalized.push(component.as_os_str());
                }
                Component::Normal(part) => normalized.push(part),
            }
        }

        if !normalized.starts_with(&self.root) {
            return Err(ScopeError::PathOutsideRepo {
                path: raw.to_string(),
            });
        }

        // Containment pass: canonicalize the deepest existing ancestor so a
        // symlink inside the tree cannot point the target back outside.
        let resolved = self.canonicalize_existing_prefix(&normalized)?;
        if !resolved.starts_with(&self.root) {
            return Err(ScopeError::PathOutsideRepo {
                path: raw.to_string(),
            });
        }

        Ok(normalized)
    }

    /// Canonicalize the longest existing prefix of `path` and re-append the
    /// not-yet-existing suffix. New files resolve through their parent.
    fn canonicalize_existing_prefix(&self, path: &Path) -> Result<PathBuf, ScopeError> {
        let mut existing = path.to_path_buf();
        let mut suffix: Vec<std::ffi::OsString> = Vec::new();

        while !existing.exists() {
            match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) => {
                    suffix.push(name.to_os_string());
                    existing = parent.to_path_buf();
                }
                _ => break,
            }
        }

        let mut resolved = existing.canonicalize().map_err(|source| ScopeError::Io {
            path: existing.clone(),
            source,
        })?;
        for part in suffix.iter().rev() {
            resolved.push(part);
        }
        Ok(resolved)
    }
}
