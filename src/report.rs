//! Batch reports.
//!
//! Per-target failures are ordinary data here, not `Err`s: one unmatchable
//! test must never abort the rest of a batch (see `error` for the conditions
//! that do). Every requested test name lands in exactly one place — one
//! file's successes, one file's failures, or the batch-level unmatched list.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Why a single target could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// No module under the root claims the package import path.
    PackageNotFound,
    /// No top-level function with the requested name in any loaded file.
    TestNotFound,
    /// A candidate file could not be parsed; the target may live there.
    ParseFailed(String),
    /// The declaration exists but is not a test/fuzz entry point; carries the
    /// actual parameter type for the operator to inspect.
    SignatureMismatch(String),
    /// The declaration has no body to insert into.
    MissingBody,
    /// A subtest path was requested but no subtest invocation in the
    /// declaration could produce that name.
    NoSubtestStructure,
    /// The harness parameter is unnamed (`_`), so no skip call can reference
    /// it.
    UnnamedTestParameter,
    /// A splice produced source that no longer parses; the file is left
    /// unmodified.
    RewriteFailed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::PackageNotFound => write!(f, "package not found under the root"),
            FailureReason::TestNotFound => write!(f, "no declaration with this name"),
            FailureReason::ParseFailed(file) => {
                write!(f, "candidate file failed to parse: {}", file)
            }
            FailureReason::SignatureMismatch(param_type) => write!(
                f,
                "declaration is not a test or fuzz entry point (parameter type {})",
                if param_type.is_empty() { "missing" } else { param_type }
            ),
            FailureReason::MissingBody => write!(f, "declaration has no body"),
            FailureReason::NoSubtestStructure => {
                write!(f, "no subtest invocation can produce the requested name")
            }
            FailureReason::UnnamedTestParameter => {
                write!(f, "test parameter is unnamed; nothing to call Skip on")
            }
            FailureReason::RewriteFailed(message) => {
                write!(f, "rewrite produced unparseable source: {}", message)
            }
        }
    }
}

/// A test that failed within a located file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    pub test: String,
    pub reason: FailureReason,
}

/// A target that could not be attributed to any file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedTarget {
    pub package: String,
    pub test: String,
    pub reason: FailureReason,
}

/// Outcome for one file in which at least one requested test matched.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    /// Path relative to the batch root.
    pub file: PathBuf,
    /// Import path of the package the file was resolved under.
    pub package: String,
    /// Full new file content. Equal to the input bytes when nothing changed.
    pub modified_source: String,
    /// Whether `modified_source` differs from the on-disk content.
    pub changed: bool,
    pub successes: Vec<String>,
    pub failures: Vec<TestFailure>,
}

/// Which guard shape a scanned quarantine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuardKind {
    /// Whole-function skip at the top of a test body.
    Function,
    /// Runtime-name-guarded skip inside a subtest callback.
    Subtest,
}

/// One quarantine guard found in the tree by [`crate::engine::Engine::scan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardSite {
    /// Path relative to the scan root.
    pub file: PathBuf,
    /// Enclosing test/fuzz declaration.
    pub function: String,
    pub kind: GuardKind,
    /// The quarantined names: the function name itself for `Function`
    /// guards, the guard's comparison set for `Subtest` guards.
    pub names: Vec<String>,
    /// Tracking identifier parsed back out of the guard message.
    pub reason: String,
}

/// The aggregate outcome of one quarantine/unquarantine batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuarantineReport {
    /// One entry per file in which at least one requested test matched.
    pub files: Vec<FileResult>,
    /// Targets that matched no file at all.
    pub unmatched: Vec<UnmatchedTarget>,
}

impl QuarantineReport {
    /// Fold another file outcome into the batch, keeping at most one entry
    /// per file.
    pub fn push_file(&mut self, result: FileResult) {
        match self.files.iter_mut().find(|f| f.file == result.file) {
            Some(existing) => {
                existing.modified_source = result.modified_source;
                existing.changed = existing.changed || result.changed;
                existing.successes.extend(result.successes);
                existing.failures.extend(result.failures);
            }
            None => self.files.push(result),
        }
    }

    pub fn push_unmatched(
        &mut self,
        package: impl Into<String>,
        test: impl Into<String>,
        reason: FailureReason,
    ) {
        self.unmatched.push(UnmatchedTarget {
            package: package.into(),
            test: test.into(),
            reason,
        });
    }

    /// Every failed test name with its reason, across files and unmatched
    /// targets.
    pub fn failures(&self) -> Vec<(String, String, FailureReason)> {
        let mut out = Vec::new();
        for file in &self.files {
            for failure in &file.failures {
                out.push((
                    file.package.clone(),
                    failure.test.clone(),
                    failure.reason.clone(),
                ));
            }
        }
        for unmatched in &self.unmatched {
            out.push((
                unmatched.package.clone(),
                unmatched.test.clone(),
                unmatched.reason.clone(),
            ));
        }
        out
    }

    /// Files whose content actually changed.
    pub fn changed_files(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|f| f.changed)
    }

    pub fn success_count(&self) -> usize {
        self.files.iter().map(|f| f.successes.len()).sum()
    }
}
