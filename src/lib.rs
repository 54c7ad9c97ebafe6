#![forbid(unsafe_code)]
//! skipjack — quarantine flaky Go tests without deleting them.
//!
//! Given a root directory holding one or more Go modules and a list of
//! fully-qualified test (or subtest) names, the engine rewrites the declaring
//! source files so those tests skip themselves at run time, tagged with a
//! tracking identifier so the change is reviewable and reversible. Subtests
//! whose names are only assembled at run time (table-driven tests) are
//! handled by a runtime-name-guarded skip at the subtest callback's entry.
//!
//! The library performs no network I/O and writes no files; it returns the
//! full rewritten content per file and a per-target success/failure report,
//! and the caller persists what it wants. The bundled `skipjack` binary is
//! such a caller.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: `Result` or `Option` with `?` / `ok_or` /
//!   `map_err`. Per-target problems are report data, never panics.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - **True invariants**: if a panic represents an engine bug, use
//!   `.expect("INVARIANT: reason")` with a clear explanation.

pub mod cli;
pub mod engine;
pub mod error;
pub mod loader;
pub mod parse;
pub mod report;
pub mod rewrite;
pub mod target;

pub use engine::Engine;
pub use error::EngineError;
pub use report::{FailureReason, FileResult, GuardKind, GuardSite, QuarantineReport};
pub use target::{QuarantineTarget, normalize};
