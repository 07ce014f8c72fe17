// diff.rs — Line-level diff baseline for the policy gates.
//
// The gates do not need a full edit script, only two projections of the
// diff: which lines of the proposed content are new (for the stub gate,
// which must ignore carried-over code), and which lines of the current
// content disappear (for the regression gate). Both are computed by
// multiset membership on right-trimmed lines.

use std::collections::HashMap;

/// 1-based numbers of lines in `new_content` that do not occur in
/// `old_content` (multiset semantics: each old occurrence absorbs one new
/// occurrence). With no prior content every line is added.
pub fn added_lines(old_content: Option<&str>, new_content: &str) -> Vec<usize> {
    let mut budget: HashMap<&str, usize> = HashMap::new();
    if let Some(old) = old_content {
        for line in old.lines() {
            *budget.entry(line.trim_end()).or_insert(0) += 1;
        }
    }

    let mut added = Vec::new();
    for (idx, line) in new_content.lines().enumerate() {
        let key = line.trim_end();
        match budget.get_mut(key) {
            Some(count) if *count > 0 => *count -= 1,
            _ => added.push(idx + 1),
        }
    }
    added
}

/// Right-trimmed lines of `old_content` that do not survive into
/// `new_content` (multiset semantics), with their 1-based line numbers.
pub fn removed_lines<'a>(old_content: &'a str, new_content: &str) -> Vec<(usize, &'a str)> {
    let mut budget: HashMap<&str, usize> = HashMap::new();
    for line in new_content.lines() {
        *budget.entry(line.trim_end()).or_insert(0) += 1;
    }

    let mut removed = Vec::new();
    for (idx, line) in old_content.lines().enumerate() {
        let key = line.trim_end();
        match budget.get_mut(key) {
            Some(count) if *count > 0 => *count -= 1,
            _ => removed.push((idx + 1, line)),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_file_is_all_added() {
        let added = added_lines(None, "a\nb\nc\n");
        assert_eq!(added, vec![1, 2, 3]);
    }

    #[test]
    fn unchanged_lines_are_not_added() {
        let added = added_lines(Some("a\nb\n"), "a\nnew\nb\n");
        assert_eq!(added, vec![2]);
    }

    #[test]
    fn duplicate_lines_respect_multiset_budget() {
        // old has one "x", new has two: the second is added.
        let added = added_lines(Some("x\n"), "x\nx\n");
        assert_eq!(added, vec![2]);
    }

    #[test]
    fn removed_lines_report_disappearances() {
        let removed = removed_lines("keep\ndrop me\n", "keep\n");
        assert_eq!(removed, vec![(2, "drop me")]);
    }

    #[test]
    fn trailing_whitespace_is_not_a_change() {
        let added = added_lines(Some("a  \n"), "a\n");
        assert!(added.is_empty());
        let removed = removed_lines("a  \n", "a\n");
        assert!(removed.is_empty());
    }
}
