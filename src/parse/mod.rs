//! Go source parsing.
//!
//! Wraps tree-sitter-go behind [`GoSource`]: one parsed file whose text and
//! tree stay in sync across edits. Rewrites splice new bytes into the original
//! text and reparse, so untouched regions are preserved verbatim and output
//! stays byte-stable for files nothing changed in.

pub mod decl;

use std::cell::RefCell;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

thread_local! {
    static GO_PARSER: RefCell<Parser> = RefCell::new(make_go_parser());
}

fn make_go_parser() -> Parser {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .expect("INVARIANT: bundled Go grammar matches the tree-sitter ABI");
    parser
}

/// Why a file could not be used for matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("parser produced no tree")]
    NoTree,
    #[error("file contains syntax errors")]
    Syntax,
}

/// A parsed Go file: source text plus its syntax tree.
#[derive(Debug)]
pub struct GoSource {
    text: String,
    tree: Tree,
}

impl GoSource {
    /// Parse a file's full contents.
    ///
    /// Files with syntax errors are rejected: splicing edits around ERROR
    /// nodes risks corrupting code, and a file that does not build cannot
    /// contain a running flaky test anyway.
    pub fn parse(text: String) -> Result<Self, ParseError> {
        let tree = GO_PARSER
            .with(|p| p.borrow_mut().parse(&text, None))
            .ok_or(ParseError::NoTree)?;
        if tree.root_node().has_error() {
            return Err(ParseError::Syntax);
        }
        Ok(GoSource { text, tree })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }

    /// Replace a byte range and reparse.
    ///
    /// The engine only splices well-formed statements at statement
    /// boundaries, so the result must still parse; a syntax error here means
    /// a rewrite bug and is surfaced rather than written back to the caller.
    pub fn splice(&mut self, range: Range<usize>, replacement: &str) -> Result<(), ParseError> {
        let mut text = String::with_capacity(self.text.len() + replacement.len());
        text.push_str(&self.text[..range.start]);
        text.push_str(replacement);
        text.push_str(&self.text[range.end..]);
        let reparsed = GoSource::parse(text)?;
        self.text = reparsed.text;
        self.tree = reparsed.tree;
        Ok(())
    }

    /// Byte offset of the start of the line containing `byte`.
    pub fn line_start(&self, byte: usize) -> usize {
        self.text[..byte].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Leading whitespace of the line containing `byte`.
    pub fn line_indent(&self, byte: usize) -> &str {
        let start = self.line_start(byte);
        let rest = &self.text[start..];
        let end = rest
            .char_indices()
            .find(|(_, c)| *c != ' ' && *c != '\t')
            .map_or(rest.len(), |(i, _)| i);
        &rest[..end]
    }
}

/// Named children of a node, in source order.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Direct statements of a block, skipping comments.
pub fn block_statements<'t>(block: Node<'t>) -> Vec<Node<'t>> {
    named_children(block)
        .into_iter()
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Decode a Go interpreted string literal (including its quotes) to its value.
///
/// Handles the escapes the engine itself renders plus the common single-byte
/// ones; anything else is kept verbatim, which is safe for comparison because
/// the engine never renders such escapes.
pub fn decode_string_literal(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Encode a value as a Go interpreted string literal, quotes included.
pub fn encode_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
