// engine.rs — The single chokepoint for write-content policy.
//
// `check_write` is the only entry the write pipeline calls. Order of checks:
//
//   1. binary guard — content with NUL bytes is unparseable
//   2. stub gate   — AST findings, gated to lines the diff actually adds
//   3. regression  — removed guards and commented-out code vs. the old file
//
// A finding that sits entirely on carried-over lines does not block: the
// write is judged on what it changes, not on debt that was already there.

use std::collections::HashSet;
use std::path::Path;

use crate::diff;
use crate::error::PolicyError;
use crate::regression;
use crate::stub::{self, Finding, Grammar};

/// How a target file is parsed, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Javascript,
    Typescript,
    Tsx,
    /// Everything else: marker scan only, no AST pass.
    Plain,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Self::Javascript,
            Some("ts") | Some("mts") | Some("cts") => Self::Typescript,
            Some("tsx") => Self::Tsx,
            _ => Self::Plain,
        }
    }

    fn grammar(self) -> Option<Grammar> {
        match self {
            Self::Javascript => Some(Grammar::Javascript),
            Self::Typescript => Some(Grammar::Typescript),
            Self::Tsx => Some(Grammar::Tsx),
            Self::Plain => None,
        }
    }

    pub fn is_ecmascript(self) -> bool {
        self.grammar().is_some()
    }
}

/// Run both policy gates over a proposed write.
///
/// `previous` is the file's current content, `None` for a new file. Any
/// error aborts the write; `Ok(())` means both gates passed.
pub fn check_write(
    target: &Path,
    previous: Option<&str>,
    proposed: &str,
) -> Result<(), PolicyError> {
    if proposed.bytes().any(|b| b == 0) {
        return Err(PolicyError::Unparseable {
            reason: "content contains NUL bytes".to_string(),
        });
    }

    let kind = SourceKind::from_path(target);
    let findings = match kind.grammar() {
        Some(grammar) => stub::scan_source(grammar, proposed)?,
        None => stub::scan_plain_lines(proposed),
    };

    let added: HashSet<usize> = diff::added_lines(previous, proposed).into_iter().collect();
    if let Some(blocking) = first_blocking(&findings, &added) {
        tracing::debug!(
            target = %target.display(),
            line = blocking.start_line,
            reason = %blocking.reason,
            "stub gate rejected write"
        );
        return Err(PolicyError::StubDetected {
            line: blocking.start_line,
            reason: blocking.reason.clone(),
        });
    }

    if let Some(old) = previous {
        regression::check_regression(old, proposed, kind.is_ecmascript())?;
    }

    Ok(())
}

/// First finding whose line range touches an added line.
fn first_blocking<'f>(findings: &'f [Finding], added: &HashSet<usize>) -> Option<&'f Finding> {
    findings
        .iter()
        .find(|f| (f.start_line..=f.end_line).any(|line| added.contains(&line)))
}
