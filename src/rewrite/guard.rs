//! Guard shapes: rendering and structural recognition.
//!
//! A quarantine guard is a tagged, recognizable statement, never free-form
//! text. Two shapes exist:
//!
//! - whole-function: `t.Skip("quarantined: TICKET-1")` as the first statement
//!   of a test body;
//! - subtest: `if n := t.Name(); n == "TestFoo/bar" { t.Skip("quarantined:
//!   TICKET-1") }` at the entry of a subtest callback, comparing the live
//!   hierarchical test name so dynamically-built subtest names are matched at
//!   run time.
//!
//! The string-literal prefix `quarantined` is the machine-readable tag that
//! makes both shapes detectable and reversible later.

use tree_sitter::Node;

use crate::parse::{GoSource, block_statements, decode_string_literal, encode_string_literal, named_children};

/// Literal prefix that marks a skip message as engine-owned.
pub const GUARD_TAG: &str = "quarantined";

/// Variable the subtest guard binds the live test name to.
const GUARD_VAR: &str = "n";

/// The skip message for a batch reason.
pub fn guard_message(reason: &str) -> String {
    if reason.is_empty() {
        GUARD_TAG.to_string()
    } else {
        format!("{GUARD_TAG}: {reason}")
    }
}

/// Whether a skip message carries the engine's tag.
pub fn is_tagged_message(message: &str) -> bool {
    match message.strip_prefix(GUARD_TAG) {
        Some(rest) => rest.is_empty() || rest.starts_with(':'),
        None => false,
    }
}

/// Extract the tracking reason back out of a guard message.
pub fn reason_of(message: &str) -> &str {
    message
        .strip_prefix(GUARD_TAG)
        .map(|rest| rest.strip_prefix(':').unwrap_or(rest).trim_start())
        .unwrap_or(message)
}

/// Render the whole-function guard statement.
pub fn render_whole(param: &str, reason: &str) -> String {
    format!("{param}.Skip({})", encode_string_literal(&guard_message(reason)))
}

/// Render the subtest guard.
///
/// The first line carries no indentation (the caller splices it in place);
/// continuation lines are indented for a guard sitting at `indent`.
pub fn render_subtest(param: &str, names: &[String], message: &str, indent: &str) -> String {
    let comparisons = names
        .iter()
        .map(|name| format!("{GUARD_VAR} == {}", encode_string_literal(name)))
        .collect::<Vec<_>>()
        .join(" || ");
    format!(
        "if {GUARD_VAR} := {param}.Name(); {comparisons} {{\n{indent}\t{param}.Skip({})\n{indent}}}",
        encode_string_literal(message)
    )
}

/// A recognized whole-function guard.
#[derive(Debug, Clone)]
pub struct SkipCall<'t> {
    pub node: Node<'t>,
    pub param: String,
    pub message: String,
}

/// A recognized subtest guard.
#[derive(Debug, Clone)]
pub struct SubtestGuard<'t> {
    pub node: Node<'t>,
    pub param: String,
    pub names: Vec<String>,
    pub message: String,
}

/// Recognize `param.Skip("quarantined…")` in statement position.
pub fn as_tagged_skip<'t>(src: &GoSource, stmt: Node<'t>) -> Option<SkipCall<'t>> {
    let call = match stmt.kind() {
        "expression_statement" => named_children(stmt).into_iter().next()?,
        _ => return None,
    };
    if call.kind() != "call_expression" {
        return None;
    }
    let (param, method) = selector_parts(src, call)?;
    if method != "Skip" {
        return None;
    }
    let args = named_children(call.child_by_field_name("arguments")?);
    let [arg] = args.as_slice() else {
        return None;
    };
    if arg.kind() != "interpreted_string_literal" {
        return None;
    }
    let message = decode_string_literal(src.node_text(*arg))?;
    if !is_tagged_message(&message) {
        return None;
    }
    Some(SkipCall {
        node: stmt,
        param,
        message,
    })
}

/// Recognize the subtest guard shape.
pub fn as_subtest_guard<'t>(src: &GoSource, stmt: Node<'t>) -> Option<SubtestGuard<'t>> {
    if stmt.kind() != "if_statement" {
        return None;
    }

    // Initializer: `n := param.Name()`
    let init = stmt.child_by_field_name("initializer")?;
    if init.kind() != "short_var_declaration" {
        return None;
    }
    let left = named_children(init.child_by_field_name("left")?);
    let [bound] = left.as_slice() else {
        return None;
    };
    if bound.kind() != "identifier" {
        return None;
    }
    let bound_name = src.node_text(*bound).to_string();
    let right = named_children(init.child_by_field_name("right")?);
    let [call] = right.as_slice() else {
        return None;
    };
    let (param, method) = selector_parts(src, *call)?;
    if method != "Name" || !named_children(call.child_by_field_name("arguments")?).is_empty() {
        return None;
    }

    // Condition: `n == "…" || n == "…" || …`
    let mut names = Vec::new();
    collect_comparisons(src, stmt.child_by_field_name("condition")?, &bound_name, &mut names)?;

    // Consequence: a single tagged skip on the same harness parameter.
    let consequence = stmt.child_by_field_name("consequence")?;
    let stmts = block_statements(consequence);
    let [only] = stmts.as_slice() else {
        return None;
    };
    let skip = as_tagged_skip(src, *only)?;
    if skip.param != param {
        return None;
    }

    Some(SubtestGuard {
        node: stmt,
        param,
        names,
        message: skip.message,
    })
}

/// `operand.field(...)` → (operand identifier text, field name).
fn selector_parts(src: &GoSource, call: Node<'_>) -> Option<(String, String)> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "selector_expression" {
        return None;
    }
    let operand = function.child_by_field_name("operand")?;
    if operand.kind() != "identifier" {
        return None;
    }
    let field = function.child_by_field_name("field")?;
    Some((
        src.node_text(operand).to_string(),
        src.node_text(field).to_string(),
    ))
}

/// Flatten an `||`-chain of `bound == "literal"` comparisons, in source order.
/// Any other shape means the if-statement is not an engine guard.
fn collect_comparisons(
    src: &GoSource,
    node: Node<'_>,
    bound: &str,
    names: &mut Vec<String>,
) -> Option<()> {
    if node.kind() == "parenthesized_expression" {
        return collect_comparisons(src, named_children(node).into_iter().next()?, bound, names);
    }
    if node.kind() != "binary_expression" {
        return None;
    }
    let operator = node.child_by_field_name("operator")?;
    let left = node.child_by_field_name("left")?;
    let right = node.child_by_field_name("right")?;
    match src.node_text(operator) {
        "||" => {
            collect_comparisons(src, left, bound, names)?;
            collect_comparisons(src, right, bound, names)
        }
        "==" => {
            if left.kind() != "identifier" || src.node_text(left) != bound {
                return None;
            }
            if right.kind() != "interpreted_string_literal" {
                return None;
            }
            names.push(decode_string_literal(src.node_text(right))?);
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> GoSource {
        GoSource::parse(source.to_string()).unwrap()
    }

    fn first_test_body_stmt(src: &GoSource) -> Node<'_> {
        let decl = crate::parse::decl::find_function(src, "TestFoo").unwrap();
        let body = decl.child_by_field_name("body").unwrap();
        block_statements(body)[0]
    }

    #[test]
    fn test_message_round_trip() {
        assert_eq!(guard_message("JIRA-17"), "quarantined: JIRA-17");
        assert_eq!(guard_message(""), "quarantined");
        assert!(is_tagged_message("quarantined: JIRA-17"));
        assert!(is_tagged_message("quarantined"));
        assert!(!is_tagged_message("quarantine me"));
        assert_eq!(reason_of("quarantined: JIRA-17"), "JIRA-17");
        assert_eq!(reason_of("quarantined"), "");
    }

    #[test]
    fn test_recognize_rendered_whole_guard() {
        let stmt = render_whole("t", "JIRA-17");
        let src = parse(&format!(
            "package p\n\nimport \"testing\"\n\nfunc TestFoo(t *testing.T) {{\n\t{stmt}\n}}\n"
        ));
        let node = first_test_body_stmt(&src);
        let skip = as_tagged_skip(&src, node).unwrap();
        assert_eq!(skip.param, "t");
        assert_eq!(skip.message, "quarantined: JIRA-17");
    }

    #[test]
    fn test_untagged_skip_is_not_a_guard() {
        let src = parse(
            "package p\n\nimport \"testing\"\n\nfunc TestFoo(t *testing.T) {\n\tt.Skip(\"slow on CI\")\n}\n",
        );
        let node = first_test_body_stmt(&src);
        assert!(as_tagged_skip(&src, node).is_none());
    }

    #[test]
    fn test_recognize_rendered_subtest_guard() {
        let guard = render_subtest(
            "t",
            &["TestFoo/a".to_string(), "TestFoo/b c".to_string()],
            "quarantined: JIRA-17",
            "\t",
        );
        let src = parse(&format!(
            "package p\n\nimport \"testing\"\n\nfunc TestFoo(t *testing.T) {{\n\t{guard}\n}}\n"
        ));
        let node = first_test_body_stmt(&src);
        let parsed = as_subtest_guard(&src, node).unwrap();
        assert_eq!(parsed.param, "t");
        assert_eq!(parsed.names, vec!["TestFoo/a", "TestFoo/b c"]);
        assert_eq!(parsed.message, "quarantined: JIRA-17");
    }

    #[test]
    fn test_foreign_if_statement_is_not_a_guard() {
        let src = parse(
            "package p\n\nimport \"testing\"\n\nfunc TestFoo(t *testing.T) {\n\tif n := t.Name(); n == \"x\" {\n\t\tt.Log(\"seen\")\n\t}\n}\n",
        );
        let node = first_test_body_stmt(&src);
        assert!(as_subtest_guard(&src, node).is_none());
    }

    #[test]
    fn test_guard_render_is_deterministic() {
        let a = render_subtest("t", &["TestFoo/a".to_string()], "quarantined", "\t\t");
        let b = render_subtest("t", &["TestFoo/a".to_string()], "quarantined", "\t\t");
        assert_eq!(a, b);
        assert_eq!(
            a,
            "if n := t.Name(); n == \"TestFoo/a\" {\n\t\t\tt.Skip(\"quarantined\")\n\t\t}"
        );
    }
}
