// header.rs — Plan document header parsing.
//
// A plan header sits at the very top of the file between two `---` lines:
//
//   ---
//   plan_id: FOUNDATION-1
//   status: APPROVED
//   authority: owner
//   ---
//
// Keys are ASCII identifiers, values run to end-of-line and are trimmed.
// The parser is permissive about lines it does not understand, but a header
// without a valid plan_id and status is no header at all — such documents
// load as UNPARSEABLE and can never authorize anything.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Plan identifiers: `^[A-Za-z0-9._:-]{1,128}$`.
static PLAN_ID_RE: OnceLock<Regex> = OnceLock::new();

fn plan_id_re() -> &'static Regex {
    PLAN_ID_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._:-]{1,128}$").expect("plan id pattern is valid"))
}

static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("key pattern is valid"))
}

/// Lifecycle status of a plan document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStatus {
    Draft,
    Approved,
    Archived,
    /// The document exists but its header could not be parsed; it is listed
    /// for visibility and excluded from authorization.
    Unparseable,
}

impl PlanStatus {
    fn from_header_value(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(Self::Draft),
            "APPROVED" => Some(Self::Approved),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Approved => "APPROVED",
            Self::Archived => "ARCHIVED",
            Self::Unparseable => "UNPARSEABLE",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully parsed plan header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanHeader {
    pub plan_id: String,
    pub status: PlanStatus,
    pub authority: Option<String>,
    pub scope: Option<String>,
    /// Any further key/value pairs, preserved for linting and display.
    pub extra: BTreeMap<String, String>,
}

/// True when `id` matches the plan identifier grammar.
pub fn is_valid_plan_id(id: &str) -> bool {
    plan_id_re().is_match(id)
}

/// Parse the leading header of a plan document.
///
/// Returns `None` when the document has no well-formed header: no opening
/// `---`, no closing `---`, missing or invalid `plan_id`, or an unknown
/// `status` value.
pub fn parse_header(content: &str) -> Option<PlanHeader> {
    let mut lines = content.lines();

    // The opening delimiter must be the first non-blank line.
    loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) if line.trim() == "---" => break,
            _ => return None,
        }
    }

    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut closed = false;
    for line in lines {
        if line.trim() == "---" {
            closed = true;
            break;
        }
        // Permissive: lines that are not `key: value` are skipped, and the
        // first occurrence of a key wins.
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key_re().is_match(key) {
                fields.entry(key.to_string()).or_insert_with(|| value.trim().to_string());
            }
        }
    }
    if !closed {
        return None;
    }

    let plan_id = fields.get("plan_id")?.clone();
    if !is_valid_plan_id(&plan_id) {
        return None;
    }
    let status = PlanStatus::from_header_value(fields.get("status")?)?;

    let authority = fields.remove("authority");
    let scope = fields.remove("scope");
    fields.remove("plan_id");
    fields.remove("status");

    Some(PlanHeader {
        plan_id,
        status,
        authority,
        scope,
        extra: fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "---\nplan_id: FOUNDATION-1\nstatus: APPROVED\nauthority: owner\n---\n# Body\n";

    #[test]
    fn parses_well_formed_header() {
        let header = parse_header(GOOD).unwrap();
        assert_eq!(header.plan_id, "FOUNDATION-1");
        assert_eq!(header.status, PlanStatus::Approved);
        assert_eq!(header.authority.as_deref(), Some("owner"));
        assert_eq!(header.scope, None);
    }

    #[test]
    fn header_must_open_the_document() {
        assert!(parse_header("# Title first\n---\nplan_id: X\nstatus: DRAFT\n---\n").is_none());
    }

    #[test]
    fn unclosed_header_is_unparseable() {
        assert!(parse_header("---\nplan_id: X\nstatus: DRAFT\n# no closing fence\n").is_none());
    }

    #[test]
    fn missing_plan_id_is_unparseable() {
        assert!(parse_header("---\nstatus: APPROVED\n---\nbody\n").is_none());
    }

    #[test]
    fn invalid_plan_id_is_unparseable() {
        assert!(parse_header("---\nplan_id: has spaces\nstatus: APPROVED\n---\n").is_none());
        let long = format!("---\nplan_id: {}\nstatus: APPROVED\n---\n", "x".repeat(129));
        assert!(parse_header(&long).is_none());
    }

    #[test]
    fn unknown_status_is_unparseable() {
        assert!(parse_header("---\nplan_id: X\nstatus: PENDING\n---\n").is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let content = "---\nplan_id: P.1\nstatus: DRAFT\nnot a field line\n9bad: key\n---\n";
        let header = parse_header(content).unwrap();
        assert_eq!(header.plan_id, "P.1");
        assert!(header.extra.is_empty());
    }

    #[test]
    fn extra_fields_are_preserved() {
        let content = "---\nplan_id: P:2\nstatus: ARCHIVED\nowner_team: infra\n---\n";
        let header = parse_header(content).unwrap();
        assert_eq!(header.extra.get("owner_team").map(String::as_str), Some("infra"));
    }

    #[test]
    fn values_are_trimmed_to_end_of_line() {
        let content = "---\nplan_id:   SPACED-1   \nstatus:  APPROVED\n---\n";
        let header = parse_header(content).unwrap();
        assert_eq!(header.plan_id, "SPACED-1");
    }
}
