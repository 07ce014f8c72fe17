// prompt.rs — The canonical instruction prompt.
//
// The prompt gate exists so an agent cannot act before it has read the
// operating rules. The prompt text is compiled into the binary: it cannot
// drift from the server that enforces it, and reading it requires no
// filesystem access.

/// Name of the canonical prompt.
pub const CANONICAL_PROMPT_NAME: &str = "governance-charter";

/// Prompt names the gate recognizes.
pub const RECOGNIZED_PROMPTS: &[&str] = &[CANONICAL_PROMPT_NAME, "agent-instructions"];

/// The canonical instruction prompt served by `read_prompt`.
pub const CANONICAL_PROMPT: &str = "\
# Operating Rules

You are connected to a governed repository through a mediation server.

1. Every change you make must be authorized by an APPROVED plan. Supply the
   plan file name, its plan_id, and its current SHA-256 hash with every
   write. A stale hash means the plan changed since you read it: re-read the
   plan before retrying.
2. Writes are checked before they land. Hollow implementations (empty
   bodies, trivial returns, swallowed exceptions), placeholder markers, and
   type-checker silencing are refused. Removing validation or commenting out
   live code is refused.
3. Declared repository checks run against a staged copy of the tree before
   your write commits. A failing check aborts the write; the tree is left
   untouched.
4. Every call you make is recorded in a tamper-evident audit journal,
   whether it succeeds, fails, or is blocked.
5. If the server has halted, only read tools are available. Recovery is a
   human decision; do not attempt to work around the halt.

Proceed by listing plans, reading the files you need, and making writes
scoped to your approved plan.
";

/// Look up a prompt by name.
pub fn prompt_by_name(name: &str) -> Option<&'static str> {
    if RECOGNIZED_PROMPTS.contains(&name) {
        Some(CANONICAL_PROMPT)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_names_resolve() {
        assert!(prompt_by_name("governance-charter").is_some());
        assert!(prompt_by_name("agent-instructions").is_some());
        assert!(prompt_by_name("other").is_none());
    }
}
