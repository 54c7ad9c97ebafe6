//! Subtest call-site discovery.
//!
//! Table-driven tests build subtest names at run time, so a requested name
//! like `TestFoo/case_1` cannot reliably be tied to one `t.Run` call by
//! static matching alone. Discovery instead records, for every `.Run`
//! callback in a declaration, the statically-known shape of the names it can
//! produce: a path of segments that are either a string literal (known) or a
//! dynamic expression (matches anything). The injector uses the shape to
//! prune guards down to the sites that could produce the requested name; the
//! runtime name comparison in the guard keeps any remaining over-approximation
//! inert.

use tree_sitter::Node;

use crate::parse::{GoSource, decode_string_literal, named_children};

/// One path step of a subtest name, as known statically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// The `.Run` name argument is a string literal with this run-time form.
    Literal(String),
    /// The name argument is computed; any value is possible.
    Dynamic,
}

/// A `.Run(name, func(t *testing.T) {...})` call site inside a declaration.
#[derive(Debug, Clone)]
pub struct RunSite<'t> {
    /// The callback's body block.
    pub body: Node<'t>,
    /// The callback's harness parameter; `None` when unnamed or `_`.
    pub param: Option<String>,
    /// Name segments from the declaration down to this site's subtests.
    pub path: Vec<Segment>,
}

/// All subtest call sites under a declaration body, at any nesting depth,
/// in source order.
pub fn run_sites<'t>(src: &'t GoSource, decl_body: Node<'t>) -> Vec<RunSite<'t>> {
    let mut sites = Vec::new();
    walk(src, decl_body, &[], &mut sites);
    sites
}

/// Whether a site can produce the requested subtest path (the segments after
/// the declaration name).
pub fn site_matches(site: &RunSite<'_>, requested: &[&str]) -> bool {
    site.path.len() == requested.len()
        && site
            .path
            .iter()
            .zip(requested)
            .all(|(segment, want)| match segment {
                Segment::Dynamic => true,
                Segment::Literal(lit) => lit == want,
            })
}

fn walk<'t>(src: &'t GoSource, node: Node<'t>, path: &[Segment], sites: &mut Vec<RunSite<'t>>) {
    for child in named_children(node) {
        if let Some((segment, param, body)) = as_run_call(src, child) {
            let mut extended = path.to_vec();
            extended.push(segment);
            sites.push(RunSite {
                body,
                param,
                path: extended.clone(),
            });
            walk(src, body, &extended, sites);
        } else {
            walk(src, child, path, sites);
        }
    }
}

/// Match `<expr>.Run(<name>, func(t *testing.T) {...})`; returns the name
/// segment, the callback parameter, and the callback body.
fn as_run_call<'t>(
    src: &'t GoSource,
    node: Node<'t>,
) -> Option<(Segment, Option<String>, Node<'t>)> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if function.kind() != "selector_expression" {
        return None;
    }
    let field = function.child_by_field_name("field")?;
    if src.node_text(field) != "Run" {
        return None;
    }

    let args = named_children(node.child_by_field_name("arguments")?);
    let [name_arg, callback] = args.as_slice() else {
        return None;
    };
    if callback.kind() != "func_literal" {
        return None;
    }

    // The callback must take exactly one *testing.T parameter; this is what
    // distinguishes subtest runs from unrelated .Run methods.
    let params = named_children(callback.child_by_field_name("parameters")?)
        .into_iter()
        .filter(|n| n.kind() == "parameter_declaration")
        .collect::<Vec<_>>();
    let [param_decl] = params.as_slice() else {
        return None;
    };
    let type_node = param_decl.child_by_field_name("type")?;
    let type_text: String = src
        .node_text(type_node)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if type_text != "*testing.T" {
        return None;
    }
    let param = {
        let mut cursor = param_decl.walk();
        param_decl
            .children_by_field_name("name", &mut cursor)
            .next()
            .map(|n| src.node_text(n).to_string())
            .filter(|n| n != "_")
    };

    let body = callback.child_by_field_name("body")?;
    let segment = name_segment(src, *name_arg);
    Some((segment, param, body))
}

/// The statically-known form of a `.Run` name argument.
fn name_segment(src: &GoSource, arg: Node<'_>) -> Segment {
    let value = match arg.kind() {
        "interpreted_string_literal" => decode_string_literal(src.node_text(arg)),
        "raw_string_literal" => src
            .node_text(arg)
            .strip_prefix('`')
            .and_then(|s| s.strip_suffix('`'))
            .map(str::to_string),
        _ => None,
    };
    match value {
        Some(v) if v.chars().all(|c| !c.is_control()) => Segment::Literal(sanitize(&v)),
        // Literals with characters the test harness would hex-escape are
        // treated as dynamic so pruning stays conservative.
        _ => Segment::Dynamic,
    }
}

/// Go's runtime rewrites spaces in subtest names to underscores; requested
/// names arrive in that rewritten form.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
