// stub.rs — AST-level stub and forbidden-pattern detection.
//
// Parses ECMAScript-family sources with tree-sitter and walks the tree once,
// collecting findings:
//
//   - function/method/arrow bodies that are empty, comment-only, or consist
//     solely of a trivial return (`return;`, `return null`, `return
//     undefined`, `return void 0`, `return {}`, `return []`) or a thrown
//     string literal
//   - catch clauses that swallow: empty bodies, or logging calls with no
//     rethrow
//   - placeholder markers (TODO, FIXME, XXX, HACK, stub, mock, placeholder,
//     dummy, fake, "not implemented") in identifiers, comments, and string
//     literals — matched on word boundaries, case-insensitive
//   - type-silencing directives (@ts-nocheck, @ts-ignore, @ts-expect-error)
//
// A tree containing ERROR nodes is unparseable and the write is rejected
// outright. The caller decides which findings block, based on which lines
// the diff actually touched.

use std::sync::{Mutex, OnceLock};

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::error::PolicyError;

/// Which grammar a source file parses under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Javascript,
    Typescript,
    Tsx,
}

/// One detected stub or forbidden pattern, with its source-line range.
#[derive(Debug, Clone)]
pub struct Finding {
    /// 1-based first line of the offending node.
    pub start_line: usize,
    /// 1-based last line of the offending node.
    pub end_line: usize,
    pub reason: String,
}

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(not implemented|todo|fixme|xxx|hack|stub|mock|placeholder|dummy|fake)\b")
            .expect("marker pattern is valid")
    })
}

static JS_PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();
static TS_PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();
static TSX_PARSER: OnceLock<Mutex<Parser>> = OnceLock::new();

fn parser_for(grammar: Grammar) -> &'static Mutex<Parser> {
    let (slot, language): (&OnceLock<Mutex<Parser>>, tree_sitter::Language) = match grammar {
        Grammar::Javascript => (&JS_PARSER, tree_sitter_javascript::LANGUAGE.into()),
        Grammar::Typescript => (&TS_PARSER, tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Grammar::Tsx => (&TSX_PARSER, tree_sitter_typescript::LANGUAGE_TSX.into()),
    };
    slot.get_or_init(|| {
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .expect("bundled grammar loads");
        Mutex::new(parser)
    })
}

/// Parse a source fragment and report whether it parses cleanly as one or
/// more JavaScript statements. Used by the regression gate to decide whether
/// a comment is commented-out code.
pub(crate) fn parses_as_statement(fragment: &str) -> bool {
    let text = fragment.trim();
    if text.is_empty() {
        return false;
    }
    let parser = parser_for(Grammar::Javascript);
    let mut parser = match parser.lock() {
        Ok(guard) => guard,
        Err(_) => return false,
    };
    match parser.parse(text, None) {
        Some(tree) => {
            let root = tree.root_node();
            !root.has_error() && root.named_child_count() > 0
        }
        None => false,
    }
}

/// Scan a full source file for stub findings.
///
/// Fails closed: a source the grammar cannot parse is `Unparseable`.
pub fn scan_source(grammar: Grammar, source: &str) -> Result<Vec<Finding>, PolicyError> {
    let parser = parser_for(grammar);
    let mut parser = parser.lock().map_err(|_| PolicyError::Unparseable {
        reason: "parser lock poisoned".to_string(),
    })?;
    let tree = parser.parse(source, None).ok_or(PolicyError::Unparseable {
        reason: "parser produced no tree".to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(PolicyError::Unparseable {
            reason: "syntax errors in source".to_string(),
        });
    }

    let mut findings = Vec::new();
    walk(root, source, &mut findings);
    Ok(findings)
}

fn walk(node: Node, source: &str, findings: &mut Vec<Finding>) {
    match node.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "function_expression"
        | "function"
        | "arrow_function"
        | "method_definition" => check_function_body(node, source, findings),
        "catch_clause" => check_catch_clause(node, source, findings),
        "comment" => check_comment(node, source, findings),
        "string_fragment" | "identifier" | "property_identifier"
        | "shorthand_property_identifier" | "shorthand_property_identifier_pattern" => {
            check_markers(node, source, findings)
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, source, findings);
    }
}

fn finding(node: Node, reason: impl Into<String>) -> Finding {
    Finding {
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        reason: reason.into(),
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Named statements of a block, comments excluded.
fn block_statements<'t>(block: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn check_function_body(node: Node, source: &str, findings: &mut Vec<Finding>) {
    let body = match node.child_by_field_name("body") {
        Some(body) => body,
        None => return, // overload signatures and abstract members have none
    };

    // Arrow functions may have an expression body: `() => undefined`.
    if body.kind() != "statement_block" {
        if is_trivial_value(body, source) {
            findings.push(finding(node, "arrow body is a trivial value"));
        }
        return;
    }

    let statements = block_statements(body);
    match statements.as_slice() {
        [] => findings.push(finding(node, "empty or comment-only body")),
        [only] => match only.kind() {
            "return_statement" => {
                let value = only.named_children(&mut only.walk()).next();
                match value {
                    None => findings.push(finding(node, "body is a bare `return;`")),
                    Some(expr) if is_trivial_value(expr, source) => findings.push(finding(
                        node,
                        format!("body only returns `{}`", node_text(expr, source).trim()),
                    )),
                    Some(_) => {}
                }
            }
            "throw_statement" => {
                if let Some(expr) = only.named_children(&mut only.walk()).next() {
                    if expr.kind() == "string" || expr.kind() == "template_string" {
                        findings.push(finding(node, "body only throws a string literal"));
                    }
                }
            }
            _ => {}
        },
        _ => {}
    }
}

/// True for `null`, `undefined`, `void 0`, `{}`, `[]` (and parenthesized
/// forms of those).
fn is_trivial_value(node: Node, source: &str) -> bool {
    match node.kind() {
        "null" | "undefined" => true,
        "identifier" => node_text(node, source) == "undefined",
        "object" | "array" => node.named_child_count() == 0,
        "unary_expression" => {
            let text: String = node_text(node, source).split_whitespace().collect();
            text == "void0" || text == "void(0)"
        }
        "parenthesized_expression" => node
            .named_children(&mut node.walk())
            .next()
            .map(|inner| is_trivial_value(inner, source))
            .unwrap_or(false),
        _ => false,
    }
}

fn check_catch_clause(node: Node, source: &str, findings: &mut Vec<Finding>) {
    let body = match node.child_by_field_name("body") {
        Some(body) => body,
        None => return,
    };
    let statements = block_statements(body);

    if statements.is_empty() {
        findings.push(finding(node, "empty catch clause"));
        return;
    }

    let all_logging = statements.iter().all(|stmt| is_logging_statement(*stmt, source));
    if all_logging && !subtree_contains_throw(body) {
        findings.push(finding(node, "catch clause only logs, never rethrows"));
    }
}

/// `console.log(...)` / `logger.warn(...)`-shaped expression statements.
fn is_logging_statement(stmt: Node, source: &str) -> bool {
    if stmt.kind() != "expression_statement" {
        return false;
    }
    let call = match stmt.named_children(&mut stmt.walk()).next() {
        Some(node) if node.kind() == "call_expression" => node,
        _ => return false,
    };
    let callee = match call.child_by_field_name("function") {
        Some(node) if node.kind() == "member_expression" => node,
        _ => return false,
    };
    let property = callee
        .child_by_field_name("property")
        .map(|p| node_text(p, source))
        .unwrap_or("");
    matches!(property, "log" | "info" | "warn" | "error" | "debug" | "trace")
}

fn subtree_contains_throw(node: Node) -> bool {
    if node.kind() == "throw_statement" {
        return true;
    }
    let mut cursor = node.walk();
    let result = node.named_children(&mut cursor).any(subtree_contains_throw);
    result
}

fn check_comment(node: Node, source: &str, findings: &mut Vec<Finding>) {
    let text = node_text(node, source);
    for directive in ["@ts-nocheck", "@ts-ignore", "@ts-expect-error"] {
        if text.contains(directive) {
            findings.push(finding(node, format!("type-silencing directive {}", directive)));
        }
    }
    check_markers(node, source, findings);
}

fn check_markers(node: Node, source: &str, findings: &mut Vec<Finding>) {
    let text = node_text(node, source);
    if let Some(matched) = marker_re().find(text) {
        findings.push(finding(
            node,
            format!("forbidden marker '{}'", matched.as_str()),
        ));
    }
}

/// Marker scan for sources outside the ECMAScript family: every flagged
/// line is a finding. The AST checks do not apply.
pub fn scan_plain_lines(content: &str) -> Vec<Finding> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            marker_re().find(line).map(|matched| Finding {
                start_line: idx + 1,
                end_line: idx + 1,
                reason: format!("forbidden marker '{}'", matched.as_str()),
            })
        })
        .collect()
}
