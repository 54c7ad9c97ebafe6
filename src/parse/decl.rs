//! Test entry-point recognition.
//!
//! A top-level declaration qualifies as a quarantine-capable entry point when
//! its name starts with `Test` or `Fuzz` and it takes exactly one parameter of
//! type `*testing.T` (tests) or `*testing.F` (fuzz targets). Benchmarks
//! (`*testing.B`) are deliberately not recognized.

use tree_sitter::Node;

use super::{GoSource, named_children};

/// Which harness entry point a declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Test,
    Fuzz,
}

impl TestKind {
    fn expected_param_type(self) -> &'static str {
        match self {
            TestKind::Test => "*testing.T",
            TestKind::Fuzz => "*testing.F",
        }
    }

    fn for_name(name: &str) -> Option<Self> {
        if name.starts_with("Test") {
            Some(TestKind::Test)
        } else if name.starts_with("Fuzz") {
            Some(TestKind::Fuzz)
        } else {
            None
        }
    }
}

/// What the matcher learned about a top-level function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    /// `Some` when the declaration qualifies as a test/fuzz entry point.
    pub kind: Option<TestKind>,
    /// The harness parameter's name; `None` when unnamed or `_`.
    pub param_name: Option<String>,
    /// Rendered type of the sole parameter (empty when the parameter count
    /// is not exactly one). Reported back on signature mismatches.
    pub param_type: String,
}

/// Find a top-level function declaration by name.
pub fn find_function<'t>(src: &'t GoSource, name: &str) -> Option<Node<'t>> {
    named_children(src.root()).into_iter().find(|node| {
        node.kind() == "function_declaration"
            && node
                .child_by_field_name("name")
                .is_some_and(|n| src.node_text(n) == name)
    })
}

/// Inspect a `function_declaration` node.
pub fn function_info(src: &GoSource, node: Node<'_>) -> FunctionInfo {
    let name = node
        .child_by_field_name("name")
        .map(|n| src.node_text(n).to_string())
        .unwrap_or_default();

    let mut info = FunctionInfo {
        name: name.clone(),
        kind: None,
        param_name: None,
        param_type: String::new(),
    };

    let Some(params) = node.child_by_field_name("parameters") else {
        return info;
    };
    let decls: Vec<Node<'_>> = named_children(params)
        .into_iter()
        .filter(|n| n.kind() == "parameter_declaration")
        .collect();
    if decls.len() != 1 {
        return info;
    }
    let param = decls[0];

    let names: Vec<Node<'_>> = {
        let mut cursor = param.walk();
        param.children_by_field_name("name", &mut cursor).collect()
    };
    if names.len() > 1 {
        // `func TestX(a, b *testing.T)` declares two parameters.
        return info;
    }
    info.param_name = names
        .first()
        .map(|n| src.node_text(*n).to_string())
        .filter(|n| n != "_");

    let Some(type_node) = param.child_by_field_name("type") else {
        return info;
    };
    let type_text: String = src
        .node_text(type_node)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    info.param_type = type_text;

    if let Some(kind) = TestKind::for_name(&name) {
        if info.param_type == kind.expected_param_type() {
            info.kind = Some(kind);
        }
    }
    info
}

/// All top-level function declaration nodes, in source order.
pub fn function_nodes<'t>(src: &'t GoSource) -> Vec<Node<'t>> {
    named_children(src.root())
        .into_iter()
        .filter(|n| n.kind() == "function_declaration")
        .collect()
}

/// All qualifying test/fuzz declarations in a file, in source order.
pub fn test_declarations(src: &GoSource) -> Vec<FunctionInfo> {
    function_nodes(src)
        .into_iter()
        .map(|n| function_info(src, n))
        .filter(|info| info.kind.is_some())
        .collect()
}
