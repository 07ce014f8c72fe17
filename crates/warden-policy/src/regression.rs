// regression.rs — Diff-level regression detection.
//
// Runs against the pre-write content of the target file. Two rules:
//
// 1. A removed line that calls a guard — an identifier starting with
//    validate / verify / assert / check followed by a call — must have a
//    textually equivalent line somewhere in the new content. Deleting a
//    guard without replacement is a regression.
// 2. An added line-comment whose uncommented text matches a removed line
//    and parses as a statement means live code was commented out rather
//    than removed through review. Also a regression.
//
// The prefix set is fixed; widening it is future work.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::diff;
use crate::error::PolicyError;
use crate::stub;

static GUARD_CALL_RE: OnceLock<Regex> = OnceLock::new();

fn guard_call_re() -> &'static Regex {
    GUARD_CALL_RE.get_or_init(|| {
        Regex::new(r"\b(?i)(validate|verify|assert|check)\w*\s*\(").expect("guard pattern is valid")
    })
}

/// Check a proposed rewrite of existing content for regressions.
///
/// `ecmascript` controls whether the commented-out-code rule runs; the
/// guard-removal rule is textual and applies to every file type.
pub fn check_regression(
    old_content: &str,
    new_content: &str,
    ecmascript: bool,
) -> Result<(), PolicyError> {
    let removed = diff::removed_lines(old_content, new_content);
    if removed.is_empty() {
        return Ok(());
    }

    // Rule 1: removed guard calls need an equivalent replacement line.
    let new_trimmed: HashSet<&str> = new_content.lines().map(str::trim).collect();
    for (line_number, line) in &removed {
        if let Some(guard) = guard_call_re().find(line) {
            if !new_trimmed.contains(line.trim()) {
                return Err(PolicyError::RegressionDetected {
                    reason: format!(
                        "guard call '{}' removed at old line {} with no equivalent replacement",
                        guard.as_str().trim_end_matches('('),
                        line_number
                    ),
                });
            }
        }
    }

    if !ecmascript {
        return Ok(());
    }

    // Rule 2: removed code resurfacing as a comment.
    let removed_trimmed: HashSet<&str> = removed.iter().map(|(_, line)| line.trim()).collect();
    for (idx, line) in new_content.lines().enumerate() {
        let trimmed = line.trim();
        let Some(stripped) = trimmed.strip_prefix("//") else {
            continue;
        };
        let candidate = stripped.trim();
        if removed_trimmed.contains(candidate) && stub::parses_as_statement(candidate) {
            return Err(PolicyError::RegressionDetected {
                reason: format!("line {} comments out previously-executing code", idx + 1),
            });
        }
    }

    Ok(())
}
