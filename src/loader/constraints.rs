//! Build-constraint evaluation for Go source files.
//!
//! Mirrors the subset of the go tool's file-selection rules the engine needs:
//! `//go:build` expressions and GOOS/GOARCH filename suffixes, evaluated
//! against an enabled-tag set. The tag set is the caller's build tags plus the
//! implied host platform, which is what a plain `go test` on the host selects.

use std::collections::HashSet;
use std::path::Path;

const GOOS_LIST: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux", "netbsd",
    "openbsd", "plan9", "solaris", "wasip1", "windows",
];

const GOARCH_LIST: &[&str] = &[
    "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
    "ppc64le", "riscv64", "s390x", "wasm",
];

// GOOS values that also satisfy the `unix` tag (Go 1.19 rules).
const UNIX_GOOS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "linux", "netbsd",
    "openbsd", "solaris",
];

/// The set of build tags considered enabled during file selection.
#[derive(Debug, Clone)]
pub struct TagSet {
    tags: HashSet<String>,
}

impl TagSet {
    /// Caller-provided tags plus the implied host GOOS/GOARCH (and `unix`
    /// where Go implies it).
    pub fn with_host_platform(extra: &[String]) -> Self {
        let mut tags: HashSet<String> = extra.iter().cloned().collect();
        let goos = host_goos();
        tags.insert(goos.to_string());
        tags.insert(host_goarch().to_string());
        if UNIX_GOOS.contains(&goos) {
            tags.insert("unix".to_string());
        }
        TagSet { tags }
    }

    /// A bare tag set with no implied platform. Used by tests that need
    /// platform-independent evaluation.
    pub fn bare(tags: &[String]) -> Self {
        TagSet {
            tags: tags.iter().cloned().collect(),
        }
    }

    fn satisfies(&self, ident: &str) -> bool {
        // `gc` is the default toolchain; release tags (go1.N) are all
        // satisfied since we only inspect source, never compile it.
        self.tags.contains(ident) || ident == "gc" || ident.starts_with("go1")
    }
}

/// Whether a file participates in the build under the given tags.
///
/// `source` only needs to contain the file's header; the `//go:build` line
/// must precede the package clause, so scanning stops there.
pub fn file_included(path: &Path, source: &str, tags: &TagSet) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.starts_with('_') {
        return false;
    }
    if !suffix_allowed(name, tags) {
        return false;
    }
    match build_expression(source) {
        Some(expr) => match parse(&expr) {
            Ok(node) => node.eval(tags),
            // An unparseable constraint excludes the file, matching the go
            // tool's refusal to build it.
            Err(_) => false,
        },
        None => true,
    }
}

/// Extract the `//go:build` expression from a file header, if any.
fn build_expression(source: &str) -> Option<String> {
    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("//go:build") {
            return Some(rest.trim().to_string());
        }
        // The constraint must precede the package clause.
        if trimmed.starts_with("package ") || trimmed == "package" {
            return None;
        }
    }
    None
}

/// Apply the `name_GOOS.go` / `name_GOARCH.go` / `name_GOOS_GOARCH.go`
/// filename rules. `_test` is not a constraint suffix.
///
/// A platform token only constrains when it follows a `_`: since Go 1.4 the
/// toolchain treats a stem that is nothing but a platform token (`amd64.go`)
/// as unconstrained.
fn suffix_allowed(file_name: &str, tags: &TagSet) -> bool {
    let Some(stem) = file_name.strip_suffix(".go") else {
        return false;
    };
    let stem = stem.strip_suffix("_test").unwrap_or(stem);

    let parts: Vec<&str> = stem.split('_').collect();
    // Everything before the first '_' is never a constraint; a leading empty
    // part would mean a name starting with '_', which is rejected earlier.
    let suffixes = &parts[1..];

    match suffixes {
        [.., goos, goarch] if GOOS_LIST.contains(goos) && GOARCH_LIST.contains(goarch) => {
            tags.satisfies(goos) && tags.satisfies(goarch)
        }
        [.., last] if GOOS_LIST.contains(last) || GOARCH_LIST.contains(last) => {
            tags.satisfies(last)
        }
        _ => true,
    }
}

fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        // Rust and Go agree on the rest (linux, windows, freebsd, ...).
        other => GOOS_LIST.iter().find(|g| **g == other).copied().unwrap_or("linux"),
    }
}

fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "386",
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "arm" => "arm",
        "loongarch64" => "loong64",
        "powerpc64" => "ppc64",
        "riscv64" => "riscv64",
        "s390x" => "s390x",
        "mips" => "mips",
        "mips64" => "mips64",
        _ => "amd64",
    }
}

// ============================================================================
// Expression grammar: Expr = Or; Or = And {"||" And}; And = Unary {"&&" Unary};
// Unary = "!" Unary | "(" Expr ")" | ident
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Ident(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, tags: &TagSet) -> bool {
        match self {
            Expr::Ident(name) => tags.satisfies(name),
            Expr::Not(inner) => !inner.eval(tags),
            Expr::And(a, b) => a.eval(tags) && b.eval(tags),
            Expr::Or(a, b) => a.eval(tags) || b.eval(tags),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    AndAnd,
    OrOr,
    Not,
    LParen,
    RParen,
}

fn lex(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' => {
                chars.next();
                if chars.next() != Some('&') {
                    return Err("expected '&&'".to_string());
                }
                tokens.push(Token::AndAnd);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected '||'".to_string());
                }
                tokens.push(Token::OrOr);
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse(input: &str) -> Result<Expr, String> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Err("empty build expression".to_string());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens in build expression".to_string());
    }
    Ok(expr)
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::OrOr) {
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary_expr()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.bump();
            let right = self.unary_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.unary_expr()?))),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if self.bump() != Some(Token::RParen) {
                    return Err("missing ')'".to_string());
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}
