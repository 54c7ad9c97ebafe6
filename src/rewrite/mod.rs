//! Per-file skip injection and extraction.
//!
//! Edits are byte splices at tree-located statement boundaries; after each
//! splice the file is reparsed so every subsequent lookup works on fresh
//! offsets. Untouched bytes are preserved verbatim, which is what makes the
//! no-op path byte-stable and quarantine/unquarantine a true round trip.

pub mod guard;
pub mod subtest;

use std::ops::Range;

use tree_sitter::Node;

use crate::parse::{GoSource, ParseError, block_statements, decl, named_children};
use crate::report::FailureReason;
use subtest::{run_sites, site_matches};

/// Whether a transformation touched the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

enum Edit {
    Insert(usize, String),
    Replace(Range<usize>, String),
    Delete(Range<usize>),
}

/// Quarantine one requested test name in a parsed file.
pub fn quarantine_test(
    src: &mut GoSource,
    test: &str,
    reason: &str,
) -> Result<Applied, FailureReason> {
    let segments: Vec<&str> = test.split('/').collect();
    let function = segments[0];
    if segments.len() == 1 {
        quarantine_whole(src, function, reason)
    } else {
        quarantine_subtest(src, test, function, &segments[1..], reason)
    }
}

/// Remove the guard(s) for one requested test name in a parsed file.
/// A missing guard is a no-op, not an error.
pub fn unquarantine_test(src: &mut GoSource, test: &str) -> Result<Applied, FailureReason> {
    let segments: Vec<&str> = test.split('/').collect();
    let function = segments[0];
    if segments.len() == 1 {
        unquarantine_whole(src, function)
    } else {
        unquarantine_subtest(src, test, function)
    }
}

// ============================================================================
// Whole-function skip
// ============================================================================

fn quarantine_whole(
    src: &mut GoSource,
    function: &str,
    reason: &str,
) -> Result<Applied, FailureReason> {
    let edit = {
        let (_, info, body) = locate(src, function)?;
        if info.kind.is_none() {
            return Err(FailureReason::SignatureMismatch(info.param_type));
        }
        if block_statements(body)
            .into_iter()
            .any(|s| guard::as_tagged_skip(src, s).is_some())
        {
            None
        } else {
            let param = info.param_name.ok_or(FailureReason::UnnamedTestParameter)?;
            let stmt = guard::render_whole(&param, reason);
            Some(insertion(src, body, &stmt))
        }
    };
    apply(src, edit)
}

fn unquarantine_whole(src: &mut GoSource, function: &str) -> Result<Applied, FailureReason> {
    let edit = {
        let (_, _, body) = locate(src, function)?;
        block_statements(body)
            .into_iter()
            .find_map(|s| guard::as_tagged_skip(src, s))
            .map(|skip| Edit::Delete(removal_range(src, skip.node)))
    };
    apply(src, edit)
}

// ============================================================================
// Subtest-scoped skip
// ============================================================================

fn quarantine_subtest(
    src: &mut GoSource,
    test: &str,
    function: &str,
    rest: &[&str],
    reason: &str,
) -> Result<Applied, FailureReason> {
    // Validate the declaration and the requested path up front, before any
    // mutation, so failures never leave a half-edited file.
    {
        let (_, info, body) = locate(src, function)?;
        if info.kind.is_none() {
            return Err(FailureReason::SignatureMismatch(info.param_type));
        }
        let sites = run_sites(src, body);
        let compatible: Vec<_> = sites.iter().filter(|s| site_matches(s, rest)).collect();
        if compatible.is_empty() {
            return Err(FailureReason::NoSubtestStructure);
        }
        if compatible.iter().all(|s| s.param.is_none()) {
            return Err(FailureReason::UnnamedTestParameter);
        }
    }

    // One edit per pass; offsets are recomputed after every splice. Each pass
    // guards one more compatible site, so the loop is bounded by site count.
    let mut changed = false;
    loop {
        let edit = {
            let (_, _, body) = locate(src, function)?;
            let sites = run_sites(src, body);
            let mut pending = None;
            for site in sites.iter().filter(|s| site_matches(s, rest)) {
                let Some(param) = &site.param else { continue };
                let existing = block_statements(site.body)
                    .into_iter()
                    .find_map(|s| guard::as_subtest_guard(src, s));
                match existing {
                    Some(g) if g.names.iter().any(|n| n == test) => continue,
                    Some(g) => {
                        let indent = src.line_indent(g.node.start_byte()).to_string();
                        let mut names = g.names;
                        names.push(test.to_string());
                        let text = guard::render_subtest(&g.param, &names, &g.message, &indent);
                        pending = Some(Edit::Replace(g.node.byte_range(), text));
                        break;
                    }
                    None => {
                        pending = Some(guard_insertion(src, site.body, param, test, reason));
                        break;
                    }
                }
            }
            pending
        };
        match apply(src, edit)? {
            Applied::Changed => changed = true,
            Applied::Unchanged => break,
        }
    }
    Ok(if changed {
        Applied::Changed
    } else {
        Applied::Unchanged
    })
}

fn unquarantine_subtest(
    src: &mut GoSource,
    test: &str,
    function: &str,
) -> Result<Applied, FailureReason> {
    let mut changed = false;
    loop {
        let edit = {
            let (_, _, body) = locate(src, function)?;
            find_guard_with_name(src, body, test).map(|g| {
                let remaining: Vec<String> =
                    g.names.iter().filter(|n| *n != test).cloned().collect();
                if remaining.is_empty() {
                    Edit::Delete(removal_range(src, g.node))
                } else {
                    let indent = src.line_indent(g.node.start_byte()).to_string();
                    let text = guard::render_subtest(&g.param, &remaining, &g.message, &indent);
                    Edit::Replace(g.node.byte_range(), text)
                }
            })
        };
        match apply(src, edit)? {
            Applied::Changed => changed = true,
            Applied::Unchanged => break,
        }
    }
    Ok(if changed {
        Applied::Changed
    } else {
        Applied::Unchanged
    })
}

/// Every subtest guard under `node`, in source order. Used by the guard
/// scanner to inventory outstanding quarantines.
pub fn subtest_guards<'t>(src: &'t GoSource, node: Node<'t>) -> Vec<guard::SubtestGuard<'t>> {
    let mut found = Vec::new();
    collect_subtest_guards(src, node, &mut found);
    found
}

fn collect_subtest_guards<'t>(
    src: &'t GoSource,
    node: Node<'t>,
    found: &mut Vec<guard::SubtestGuard<'t>>,
) {
    if node.kind() == "if_statement" {
        if let Some(g) = guard::as_subtest_guard(src, node) {
            found.push(g);
            return;
        }
    }
    for child in named_children(node) {
        collect_subtest_guards(src, child, found);
    }
}

/// First subtest guard under `node` (any depth) whose comparison set holds
/// `test`.
fn find_guard_with_name<'t>(
    src: &'t GoSource,
    node: Node<'t>,
    test: &str,
) -> Option<guard::SubtestGuard<'t>> {
    if node.kind() == "if_statement" {
        if let Some(g) = guard::as_subtest_guard(src, node) {
            if g.names.iter().any(|n| n == test) {
                return Some(g);
            }
        }
    }
    named_children(node)
        .into_iter()
        .find_map(|child| find_guard_with_name(src, child, test))
}

// ============================================================================
// Shared mechanics
// ============================================================================

/// Declaration node, matcher info, and body block for a function name.
fn locate<'t>(
    src: &'t GoSource,
    function: &str,
) -> Result<(Node<'t>, decl::FunctionInfo, Node<'t>), FailureReason> {
    let node = decl::find_function(src, function).ok_or(FailureReason::TestNotFound)?;
    let info = decl::function_info(src, node);
    let body = node
        .child_by_field_name("body")
        .ok_or(FailureReason::MissingBody)?;
    Ok((node, info, body))
}

/// Build the insert for a new subtest guard at a callback's entry.
fn guard_insertion(src: &GoSource, body: Node<'_>, param: &str, test: &str, reason: &str) -> Edit {
    let (at, indent, inline_suffix) = entry_point(src, body);
    let rendered = guard::render_subtest(
        param,
        &[test.to_string()],
        &guard::guard_message(reason),
        &indent,
    );
    Edit::Insert(at, format!("\n{indent}{rendered}{inline_suffix}"))
}

/// Build the insert for a single-line statement at a block's entry.
fn insertion(src: &GoSource, body: Node<'_>, stmt: &str) -> Edit {
    let (at, indent, inline_suffix) = entry_point(src, body);
    Edit::Insert(at, format!("\n{indent}{stmt}{inline_suffix}"))
}

/// Where to insert at a block's entry: position just after `{`, the
/// indentation for the inserted statement, and a suffix that reopens the
/// original line when the block was written inline.
fn entry_point(src: &GoSource, block: Node<'_>) -> (usize, String, String) {
    let open = block.start_byte();
    let at = open + 1;
    let inline = !src.text()[at..].starts_with('\n');
    let indent = match block_statements(block).first() {
        Some(first) if has_newline_between(src, at, first.start_byte()) => {
            src.line_indent(first.start_byte()).to_string()
        }
        _ => format!("{}\t", src.line_indent(open)),
    };
    let suffix = if inline {
        format!("\n{}", src.line_indent(open))
    } else {
        String::new()
    };
    (at, indent, suffix)
}

fn has_newline_between(src: &GoSource, from: usize, to: usize) -> bool {
    src.text()[from..to].contains('\n')
}

/// Byte range that removes a statement along with the line break and
/// indentation that introduced it, restoring the pre-insertion bytes.
fn removal_range(src: &GoSource, node: Node<'_>) -> Range<usize> {
    let start = node.start_byte();
    let line_start = src.line_start(start);
    let leading_ws = src.text()[line_start..start]
        .chars()
        .all(|c| c == ' ' || c == '\t');
    if leading_ws && line_start > 0 {
        (line_start - 1)..node.end_byte()
    } else {
        start..node.end_byte()
    }
}

fn apply(src: &mut GoSource, edit: Option<Edit>) -> Result<Applied, FailureReason> {
    let result = match edit {
        None => return Ok(Applied::Unchanged),
        Some(Edit::Insert(at, text)) => src.splice(at..at, &text),
        Some(Edit::Replace(range, text)) => src.splice(range, &text),
        Some(Edit::Delete(range)) => src.splice(range, ""),
    };
    result.map(|()| Applied::Changed).map_err(rewrite_failed)
}

fn rewrite_failed(err: ParseError) -> FailureReason {
    FailureReason::RewriteFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PLAIN: &str = r#"package pkg

import "testing"

func TestFlaky(t *testing.T) {
	if 1+1 != 2 {
		t.Fatal("arithmetic broke")
	}
}

func TestStable(t *testing.T) {
	t.Log("fine")
}
"#;

    const TABLE: &str = r#"package pkg

import (
	"fmt"
	"testing"
)

func TestTable(t *testing.T) {
	for i := 0; i < 3; i++ {
		t.Run(fmt.Sprintf("case_%d", i), func(t *testing.T) {
			if i == 1 {
				t.Fail()
			}
		})
	}
}
"#;

    fn parsed(source: &str) -> GoSource {
        GoSource::parse(source.to_string()).unwrap()
    }

    #[test]
    fn test_whole_function_quarantine() {
        let mut src = parsed(PLAIN);
        let applied = quarantine_test(&mut src, "TestFlaky", "JIRA-17").unwrap();
        assert_eq!(applied, Applied::Changed);
        assert!(src.text().contains(
            "func TestFlaky(t *testing.T) {\n\tt.Skip(\"quarantined: JIRA-17\")\n\tif 1+1 != 2 {"
        ));
        // The sibling test is untouched.
        assert!(src
            .text()
            .contains("func TestStable(t *testing.T) {\n\tt.Log(\"fine\")\n}"));
    }

    #[test]
    fn test_whole_function_quarantine_is_idempotent() {
        let mut src = parsed(PLAIN);
        quarantine_test(&mut src, "TestFlaky", "JIRA-17").unwrap();
        let once = src.text().to_string();
        let applied = quarantine_test(&mut src, "TestFlaky", "JIRA-17").unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(src.text(), once);
    }

    #[test]
    fn test_whole_function_round_trip() {
        let mut src = parsed(PLAIN);
        quarantine_test(&mut src, "TestFlaky", "JIRA-17").unwrap();
        let applied = unquarantine_test(&mut src, "TestFlaky").unwrap();
        assert_eq!(applied, Applied::Changed);
        assert_eq!(src.text(), PLAIN);
    }

    #[test]
    fn test_unquarantine_without_guard_is_noop() {
        let mut src = parsed(PLAIN);
        let applied = unquarantine_test(&mut src, "TestFlaky").unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(src.text(), PLAIN);
    }

    #[test]
    fn test_missing_function_reported() {
        let mut src = parsed(PLAIN);
        assert_eq!(
            quarantine_test(&mut src, "TestGone", "JIRA-17").unwrap_err(),
            FailureReason::TestNotFound
        );
    }

    #[test]
    fn test_subtest_quarantine_guards_dynamic_site() {
        let mut src = parsed(TABLE);
        let applied = quarantine_test(&mut src, "TestTable/case_1", "JIRA-17").unwrap();
        assert_eq!(applied, Applied::Changed);
        assert!(src.text().contains(
            "func(t *testing.T) {\n\t\t\tif n := t.Name(); n == \"TestTable/case_1\" {\n\t\t\t\tt.Skip(\"quarantined: JIRA-17\")\n\t\t\t}\n\t\t\tif i == 1 {"
        ));
    }

    #[test]
    fn test_subtest_quarantine_merges_into_existing_guard() {
        let mut src = parsed(TABLE);
        quarantine_test(&mut src, "TestTable/case_1", "JIRA-17").unwrap();
        let applied = quarantine_test(&mut src, "TestTable/case_2", "JIRA-17").unwrap();
        assert_eq!(applied, Applied::Changed);
        assert!(src.text().contains(
            "if n := t.Name(); n == \"TestTable/case_1\" || n == \"TestTable/case_2\" {"
        ));
        // Still exactly one guard.
        assert_eq!(src.text().matches("t.Skip(\"quarantined: JIRA-17\")").count(), 1);
    }

    #[test]
    fn test_subtest_quarantine_is_idempotent() {
        let mut src = parsed(TABLE);
        quarantine_test(&mut src, "TestTable/case_1", "JIRA-17").unwrap();
        let once = src.text().to_string();
        let applied = quarantine_test(&mut src, "TestTable/case_1", "JIRA-17").unwrap();
        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(src.text(), once);
    }

    #[test]
    fn test_subtest_round_trip() {
        let mut src = parsed(TABLE);
        quarantine_test(&mut src, "TestTable/case_0", "JIRA-17").unwrap();
        quarantine_test(&mut src, "TestTable/case_2", "JIRA-17").unwrap();
        unquarantine_test(&mut src, "TestTable/case_0").unwrap();
        // One name left in the shared guard.
        assert!(src
            .text()
            .contains("if n := t.Name(); n == \"TestTable/case_2\" {"));
        unquarantine_test(&mut src, "TestTable/case_2").unwrap();
        assert_eq!(src.text(), TABLE);
    }

    #[test]
    fn test_subtest_literal_sites_are_pruned() {
        let source = r#"package pkg

import "testing"

func TestPair(t *testing.T) {
	t.Run("alpha", func(t *testing.T) {
		t.Log("a")
	})
	t.Run("beta", func(t *testing.T) {
		t.Log("b")
	})
}
"#;
        let mut src = parsed(source);
        quarantine_test(&mut src, "TestPair/alpha", "JIRA-17").unwrap();
        let text = src.text();
        // Only the matching callback is guarded.
        assert!(text.contains(
            "t.Run(\"alpha\", func(t *testing.T) {\n\t\tif n := t.Name(); n == \"TestPair/alpha\" {"
        ));
        assert!(text.contains("t.Run(\"beta\", func(t *testing.T) {\n\t\tt.Log(\"b\")\n\t})"));
    }

    #[test]
    fn test_subtest_path_mismatch_fails() {
        let mut src = parsed(TABLE);
        // Depth 2 path cannot come from a depth 1 site.
        assert_eq!(
            quarantine_test(&mut src, "TestTable/case_1/deeper", "JIRA-17").unwrap_err(),
            FailureReason::NoSubtestStructure
        );
    }

    #[test]
    fn test_subtest_without_run_sites_fails() {
        let mut src = parsed(PLAIN);
        assert_eq!(
            quarantine_test(&mut src, "TestFlaky/sub", "JIRA-17").unwrap_err(),
            FailureReason::NoSubtestStructure
        );
    }

    #[test]
    fn test_nested_subtest_targets_inner_site() {
        let source = r#"package pkg

import "testing"

func TestOuter(t *testing.T) {
	t.Run("mid", func(t *testing.T) {
		t.Run("leaf", func(t *testing.T) {
			t.Log("deep")
		})
	})
}
"#;
        let mut src = parsed(source);
        quarantine_test(&mut src, "TestOuter/mid/leaf", "JIRA-9").unwrap();
        let text = src.text();
        // The guard lands in the inner callback, not the outer one.
        assert!(text.contains(
            "t.Run(\"leaf\", func(t *testing.T) {\n\t\t\tif n := t.Name(); n == \"TestOuter/mid/leaf\" {"
        ));
        assert!(text.contains("t.Run(\"mid\", func(t *testing.T) {\n\t\tt.Run("));
    }

    #[test]
    fn test_fuzz_whole_function_quarantine() {
        let source = r#"package pkg

import "testing"

func FuzzDecode(f *testing.F) {
	f.Add([]byte("seed"))
	f.Fuzz(func(t *testing.T, data []byte) {
		_ = data
	})
}
"#;
        let mut src = parsed(source);
        quarantine_test(&mut src, "FuzzDecode", "JIRA-3").unwrap();
        assert!(src.text().contains(
            "func FuzzDecode(f *testing.F) {\n\tf.Skip(\"quarantined: JIRA-3\")\n\tf.Add("
        ));
    }

    #[test]
    fn test_signature_mismatch_reported() {
        let source = r#"package pkg

import "testing"

func BenchmarkThing(b *testing.B) {
	for i := 0; i < b.N; i++ {
	}
}
"#;
        let mut src = parsed(source);
        assert_eq!(
            quarantine_test(&mut src, "BenchmarkThing", "JIRA-17").unwrap_err(),
            FailureReason::SignatureMismatch("*testing.B".to_string())
        );
    }

    #[test]
    fn test_unnamed_parameter_reported() {
        let source = r#"package pkg

import "testing"

func TestAnon(_ *testing.T) {
	// nothing
}
"#;
        let mut src = parsed(source);
        assert_eq!(
            quarantine_test(&mut src, "TestAnon", "JIRA-17").unwrap_err(),
            FailureReason::UnnamedTestParameter
        );
    }
}
